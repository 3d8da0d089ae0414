/// Platform-specific functionality: the attribute query that confirms a
/// watched file is really gone, and Windows path conversion.

pub mod attributes;

pub use attributes::is_confirmed_absent;

#[cfg(windows)]
pub(crate) use attributes::to_wide;
