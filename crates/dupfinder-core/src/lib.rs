/// Dupfinder Core: duplicate-file scanning and disappearance watching.
///
/// This crate holds all of the logic and none of the presentation. Frontends
/// receive progress as `\r\n`-terminated log lines and results as plain data.
///
/// # Modules
///
/// - [`scanner`]: walks a tree, hashes every regular file with SHA-256 and
///   groups byte-identical files into duplicate classes.
/// - [`watcher`]: watches registered files and reports when one disappears.
/// - [`model`]: digests, duplicate classes and the scan result.
/// - [`platform`]: OS attribute queries used to confirm a disappearance.
/// - [`log`]: the log-line sink shared by the scanner and the watcher.
/// - [`config`] and [`error`]: tunables and error types.
pub mod config;
pub mod error;
pub mod log;
pub mod model;
pub mod platform;
pub mod scanner;
pub mod watcher;

pub use config::{ScanOptions, WatcherConfig};
pub use error::{ScanError, WatchError};
pub use log::{LogSink, SharedLog};
pub use model::{DuplicateClass, FileDigest, ScanResult};
pub use scanner::{scan, start_scan, ScanHandle, Scanner};
pub use watcher::registry::WatchedDirectory;
pub use watcher::FileWatcher;
