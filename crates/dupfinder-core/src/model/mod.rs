//! Data model for scan results.
//!
//! Re-exports the content digest and the equivalence-class types.
pub mod class;
pub mod digest;

pub use class::{ClassAccumulator, DuplicateClass, ScanResult};
pub use digest::{FileDigest, ParseDigestError, DIGEST_LEN};
