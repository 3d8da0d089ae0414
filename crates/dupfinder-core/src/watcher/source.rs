//! The seam between the completion loop and the OS change-notification
//! facility.
//!
//! A [`ChangeSource`] owns every OS watch and reports completed batches. It
//! also multiplexes the loop's command channel so the loop blocks in exactly
//! one place.
use super::completion::Command;
use super::records::ChangeBatch;
use crossbeam_channel::Receiver;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Why the completion loop woke up.
#[derive(Debug)]
pub(crate) enum Wakeup {
    Command(Command),
    Batch(ChangeBatch),
    /// The outstanding request for `dir` failed; the watch is dead.
    WatchFailed { dir: PathBuf, error: io::Error },
    /// Every command sender is gone.
    Shutdown,
}

/// Interrupts a blocked [`ChangeSource::next_wakeup`] from another thread.
pub(crate) trait Wake: Send + Sync {
    fn wake(&self);
}

/// For sources whose wait already includes the command channel.
pub(crate) struct NoopWake;

impl Wake for NoopWake {
    fn wake(&self) {}
}

pub(crate) trait ChangeSource {
    /// Start watching `dir` for name changes (non-recursive).
    fn arm(&mut self, dir: &Path) -> io::Result<()>;

    /// Issue the next request for `dir` after a batch was delivered.
    fn rearm(&mut self, dir: &Path) -> io::Result<()>;

    /// Stop watching `dir` and release everything held for it. Batches that
    /// were already in flight may still be delivered afterwards.
    fn disarm(&mut self, dir: &Path);

    /// Block until a command arrives or a watch completes.
    ///
    /// An `Err` means the multiplexor itself failed and the loop must stop.
    fn next_wakeup(&mut self, commands: &Receiver<Command>) -> io::Result<Wakeup>;

    /// A handle other threads use to interrupt [`next_wakeup`](Self::next_wakeup)
    /// after sending a command.
    fn waker(&self) -> Arc<dyn Wake>;
}
