//! Error types for the scanner and the watcher.
//!
//! Per-file scan failures never escape [`crate::scanner::scan`]; they are
//! logged and counted. Per-directory watch failures tear down the smallest
//! unit that contains them (one directory entry). Everything else is
//! surfaced to the caller.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the duplicate scanner.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan root cannot be opened or enumerated at all.
    #[error("cannot read scan root {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single file could not be opened or fully read.
    ///
    /// Recovered locally: the file is skipped and the failure logged.
    #[error("cannot read {}: {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The background scan thread ended without reporting a result.
    #[error("scan thread exited without a result")]
    Aborted,
}

/// Failures raised by the file watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// `add_file` was given something that is not currently a regular file.
    #[error("not a regular file: {}", path.display())]
    NotARegularFile { path: PathBuf },

    /// The directory could not be opened or the OS watch could not be armed.
    #[error("failed to watch {}: {source}", path.display())]
    WatchSetupFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Re-arming a directory after a completed batch failed.
    #[error("failed to re-arm watch on {}: {source}", dir.display())]
    WatchReArmFailed {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The event multiplexor itself returned an error.
    #[error("completion loop failed: {source}")]
    CompletionLoopFailed {
        #[source]
        source: io::Error,
    },

    /// The event multiplexor could not be created.
    #[error("change notification is unavailable: {source}")]
    MultiplexorUnavailable {
        #[source]
        source: io::Error,
    },

    /// The completion loop is no longer running.
    #[error("the watcher has stopped")]
    Stopped,
}
