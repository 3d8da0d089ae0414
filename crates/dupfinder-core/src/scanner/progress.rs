/// Scan progress reporting: messages sent from the scan thread to the
/// collaborator via a crossbeam channel.
use crate::error::ScanError;
use crate::log;
use crate::model::ScanResult;
use std::path::PathBuf;
use std::time::Duration;

/// Progress updates sent from the scan thread.
///
/// Exactly one terminal message (`Complete` or `Failed`) ends the stream.
#[derive(Debug)]
pub enum ScanProgress {
    /// A file was hashed.
    Hashed { path: PathBuf, files_hashed: u64 },
    /// A non-fatal error (e.g. permission denied on one file).
    Error { path: PathBuf, message: String },
    /// Scanning completed; the result set is moved to the receiver.
    Complete {
        result: ScanResult,
        duration: Duration,
    },
    /// The root could not be scanned at all.
    Failed { error: ScanError },
}

impl ScanProgress {
    /// The log line this message corresponds to, if any.
    pub fn log_line(&self) -> Option<String> {
        match self {
            Self::Hashed { path, .. } => Some(log::hashing_completed(path)),
            Self::Error { path, message } => Some(log::file_error(path, message)),
            Self::Complete { .. } | Self::Failed { .. } => None,
        }
    }
}
