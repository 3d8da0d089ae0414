/// Scanner module: finds byte-identical files under a root directory.
///
/// The walk is single-threaded and depth-first; every regular file is
/// streamed through SHA-256 and grouped by digest. Classes with a single
/// member are dropped before the result is returned.
///
/// Two entry points share the same engine:
/// - [`scan`] / [`Scanner::scan`] block the calling thread and report
///   through a [`LogSink`].
/// - [`start_scan`] runs on a background thread and reports through a
///   bounded channel of [`ScanProgress`] messages.
pub mod hash;
pub mod progress;
pub mod walk;

use crate::config::ScanOptions;
use crate::error::ScanError;
use crate::log::{self, LogSink};
use crate::model::{ClassAccumulator, ScanResult};
use crossbeam_channel::Receiver;
use hash::FileHasher;
use progress::ScanProgress;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};
use walk::WalkItem;

/// Maximum number of progress messages that may queue up in the channel.
///
/// If the collaborator falls behind the scanner blocks on `send` rather than
/// buffering an unbounded backlog.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// Per-file outcome observed while a scan runs.
#[derive(Debug)]
pub enum ScanEvent<'a> {
    Hashed { path: &'a Path, size: u64 },
    Failed { path: &'a Path, reason: String },
}

impl ScanEvent<'_> {
    pub fn log_line(&self) -> String {
        match self {
            Self::Hashed { path, .. } => log::hashing_completed(path),
            Self::Failed { path, reason } => log::file_error(path, reason),
        }
    }
}

/// Duplicate scanner configured with [`ScanOptions`].
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    options: ScanOptions,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Scan `root`, writing one line per file to `log`.
    pub fn scan<L: LogSink + ?Sized>(&self, root: &Path, log: &L) -> Result<ScanResult, ScanError> {
        self.scan_with(root, |event| log.log_line(&event.log_line()))
    }

    /// Scan `root`, handing every per-file outcome to `on_event`.
    ///
    /// Fails only when `root` itself cannot be listed; per-file problems are
    /// reported as [`ScanEvent::Failed`] and skipped.
    pub fn scan_with<F>(&self, root: &Path, mut on_event: F) -> Result<ScanResult, ScanError>
    where
        F: FnMut(ScanEvent<'_>),
    {
        let root = check_root(root)?;
        let start = Instant::now();
        info!("Starting scan of {}", root.display());

        let mut hasher = FileHasher::new(self.options.effective_chunk_size());
        let mut acc = ClassAccumulator::new();

        for item in walk::walk_files(&root, self.options.follow_file_links) {
            match item {
                WalkItem::File(path) => match hash_one(&mut hasher, &path) {
                    Ok((digest, size)) => {
                        debug!(%digest, size, "hashed {}", path.display());
                        on_event(ScanEvent::Hashed { path: &path, size });
                        acc.insert(digest, size, path);
                    }
                    Err(err) => {
                        warn!("{err}");
                        acc.record_error();
                        on_event(ScanEvent::Failed {
                            path: &path,
                            reason: failure_reason(&err),
                        });
                    }
                },
                WalkItem::Error { path, reason } => {
                    warn!("skipping {}: {reason}", path.display());
                    acc.record_error();
                    on_event(ScanEvent::Failed {
                        path: &path,
                        reason,
                    });
                }
            }
        }

        let result = acc.finish();
        info!(
            classes = result.len(),
            files = result.files_hashed,
            errors = result.errors,
            "Scan of {} finished in {:?}",
            root.display(),
            start.elapsed()
        );
        Ok(result)
    }
}

/// Scan `root` with default options.
pub fn scan<L: LogSink + ?Sized>(root: &Path, log: &L) -> Result<ScanResult, ScanError> {
    Scanner::default().scan(root, log)
}

/// Handle to a scan running on a background thread.
pub struct ScanHandle {
    /// Receiver for progress updates from the scan thread.
    pub progress_rx: Receiver<ScanProgress>,
    _thread: Option<thread::JoinHandle<()>>,
}

impl ScanHandle {
    /// Drain progress messages until the scan ends, discarding per-file
    /// updates.
    pub fn wait(self) -> Result<ScanResult, ScanError> {
        self.wait_with(|_| {})
    }

    /// Drain progress messages until the scan ends, passing every
    /// non-terminal message to `on_progress`.
    pub fn wait_with<F>(self, mut on_progress: F) -> Result<ScanResult, ScanError>
    where
        F: FnMut(&ScanProgress),
    {
        for msg in self.progress_rx.iter() {
            match msg {
                ScanProgress::Complete { result, .. } => return Ok(result),
                ScanProgress::Failed { error } => return Err(error),
                other => on_progress(&other),
            }
        }
        Err(ScanError::Aborted)
    }
}

/// Start a scan of `root_path` on a background thread.
pub fn start_scan(root_path: PathBuf, options: ScanOptions) -> ScanHandle {
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<ScanProgress>(PROGRESS_CHANNEL_CAPACITY);

    let thread = thread::Builder::new()
        .name("dupfinder-scanner".into())
        .spawn(move || {
            let start = Instant::now();
            let scanner = Scanner::new(options);
            let mut files_hashed: u64 = 0;
            let outcome = scanner.scan_with(&root_path, |event| {
                let msg = match event {
                    ScanEvent::Hashed { path, .. } => {
                        files_hashed += 1;
                        ScanProgress::Hashed {
                            path: path.to_path_buf(),
                            files_hashed,
                        }
                    }
                    ScanEvent::Failed { path, reason } => ScanProgress::Error {
                        path: path.to_path_buf(),
                        message: reason,
                    },
                };
                let _ = progress_tx.send(msg);
            });
            let terminal = match outcome {
                Ok(result) => ScanProgress::Complete {
                    result,
                    duration: start.elapsed(),
                },
                Err(error) => ScanProgress::Failed { error },
            };
            let _ = progress_tx.send(terminal);
        })
        .expect("failed to spawn scanner thread");

    ScanHandle {
        progress_rx,
        _thread: Some(thread),
    }
}

/// Resolve `root` to an absolute directory that can be listed.
fn check_root(root: &Path) -> Result<PathBuf, ScanError> {
    let unreadable = |source| ScanError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    };
    let absolute = std::path::absolute(root).map_err(unreadable)?;
    fs::read_dir(&absolute).map_err(unreadable)?;
    Ok(absolute)
}

fn hash_one(hasher: &mut FileHasher, path: &Path) -> Result<(crate::model::FileDigest, u64), ScanError> {
    hasher
        .hash_file(path)
        .map_err(|source| ScanError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        })
}

fn failure_reason(err: &ScanError) -> String {
    match err {
        ScanError::FileUnreadable { source, .. } | ScanError::RootUnreadable { source, .. } => {
            source.to_string()
        }
        other => other.to_string(),
    }
}
