//! The completion loop: the single thread that owns the watch registry.
//!
//! Registrations arrive as [`Command`]s and are answered over a reply
//! channel, so the registry never needs a lock. Completed batches are
//! processed to the end (callbacks, registry updates, re-arm) before the
//! next wakeup is taken.
use super::registry::{Removal, WatchRegistry, WatchedDirectory, WatchedFile};
use super::source::{ChangeSource, Wakeup};
use super::records::ChangeBatch;
use super::SharedCallback;
use crate::error::WatchError;
use crate::log::{self, SharedLog};
use crate::platform;
use crossbeam_channel::{Receiver, Sender};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Requests sent to the completion thread.
#[derive(Debug)]
pub(crate) enum Command {
    Add {
        /// Registry key: the canonical parent directory.
        dir: PathBuf,
        file: WatchedFile,
        reply: Sender<Result<(), WatchError>>,
    },
    Snapshot {
        reply: Sender<Vec<WatchedDirectory>>,
    },
    Shutdown,
}

pub(crate) struct CompletionLoop<S> {
    source: S,
    registry: WatchRegistry,
    commands: Receiver<Command>,
    callback: SharedCallback,
    log: SharedLog,
}

impl<S: ChangeSource> CompletionLoop<S> {
    pub(crate) fn new(
        source: S,
        commands: Receiver<Command>,
        callback: SharedCallback,
        log: SharedLog,
    ) -> Self {
        Self {
            source,
            registry: WatchRegistry::new(),
            commands,
            callback,
            log,
        }
    }

    /// Run until shutdown or until the multiplexor fails. Every watch is
    /// released before returning.
    pub(crate) fn run(mut self) -> Result<(), WatchError> {
        debug!("Watcher: completion loop started");
        loop {
            match self.source.next_wakeup(&self.commands) {
                Ok(Wakeup::Command(Command::Add { dir, file, reply })) => {
                    let outcome = self.add(dir, file);
                    let _ = reply.send(outcome);
                }
                Ok(Wakeup::Command(Command::Snapshot { reply })) => {
                    let _ = reply.send(self.registry.snapshot());
                }
                Ok(Wakeup::Command(Command::Shutdown)) | Ok(Wakeup::Shutdown) => {
                    self.teardown_all();
                    debug!("Watcher: completion loop stopped");
                    return Ok(());
                }
                Ok(Wakeup::Batch(batch)) => self.process_batch(batch),
                Ok(Wakeup::WatchFailed { dir, error }) => self.fail_directory(&dir, &error),
                Err(source) => {
                    error!("Watcher: completion loop failed: {source}");
                    self.log.log_line(&log::watcher_stopped(&source));
                    self.teardown_all();
                    return Err(WatchError::CompletionLoopFailed { source });
                }
            }
        }
    }

    fn add(&mut self, dir: PathBuf, file: WatchedFile) -> Result<(), WatchError> {
        if !self.registry.contains(&dir) {
            self.source
                .arm(&dir)
                .map_err(|source| WatchError::WatchSetupFailed {
                    path: file.registered.clone(),
                    source,
                })?;
            debug!("Watcher: armed {}", dir.display());
        }

        let leaf = file.leaf.clone();
        let registered = file.registered.clone();
        if !self.registry.insert(dir.clone(), file) {
            debug!("Watcher: {} is already watched", registered.display());
            return Ok(());
        }
        info!("Watching {}", registered.display());

        // The file may have gone between the caller's check and the arm; no
        // notification would ever arrive for that.
        self.report_if_gone(&dir, &leaf);
        Ok(())
    }

    fn process_batch(&mut self, batch: ChangeBatch) {
        let dir = batch.dir;
        if !self.registry.contains(&dir) {
            debug!("Watcher: dropping batch for released {}", dir.display());
            return;
        }

        let candidates: Vec<OsString> = if batch.overflowed {
            warn!("Watcher: change buffer overflowed for {}", dir.display());
            self.registry.files(&dir).into_iter().map(|f| f.leaf).collect()
        } else {
            let mut names: Vec<OsString> = Vec::new();
            for record in batch.records {
                if record.action.is_departure()
                    && self.registry.find(&dir, &record.name).is_some()
                    && !names.contains(&record.name)
                {
                    names.push(record.name);
                }
            }
            names
        };

        for leaf in candidates {
            if self.report_if_gone(&dir, &leaf) {
                // Entry erased and watch released; nothing left to re-arm.
                return;
            }
        }

        if let Err(source) = self.source.rearm(&dir) {
            self.log.log_line(&log::watch_rearm_failed(&dir, &source));
            let err = WatchError::WatchReArmFailed {
                dir: dir.clone(),
                source,
            };
            warn!("Watcher: {err}");
            self.teardown(&dir);
        }
    }

    /// Report `leaf` if it is confirmed absent. Returns `true` when that
    /// emptied the directory entry.
    fn report_if_gone(&mut self, dir: &Path, leaf: &OsString) -> bool {
        let Some(file) = self.registry.find(dir, leaf).cloned() else {
            return false;
        };
        if !platform::is_confirmed_absent(&dir.join(leaf)) {
            debug!("Watcher: {} is still present", file.registered.display());
            return false;
        }

        info!("File disappeared: {}", file.registered.display());
        let removal = self.registry.remove_file(dir, leaf);
        if let Some(callback) = self.callback.read().as_ref() {
            callback(file.registered.as_path());
        }

        if removal == Removal::Emptied {
            self.source.disarm(dir);
            debug!("Watcher: released {}", dir.display());
            true
        } else {
            false
        }
    }

    fn fail_directory(&mut self, dir: &Path, error: &io::Error) {
        if !self.registry.contains(dir) {
            return;
        }
        warn!("Watcher: watch on {} failed: {error}", dir.display());
        self.log.log_line(&log::watch_failed(dir, error));
        self.teardown(dir);
    }

    fn teardown(&mut self, dir: &Path) {
        let dropped = self.registry.remove_dir(dir);
        self.source.disarm(dir);
        debug!(
            files = dropped.len(),
            "Watcher: stopped watching {}",
            dir.display()
        );
    }

    fn teardown_all(&mut self) {
        for dir in self.registry.dirs() {
            self.teardown(&dir);
        }
    }
}
