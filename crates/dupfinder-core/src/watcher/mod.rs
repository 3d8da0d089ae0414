/// Watcher module: reports when registered files disappear.
///
/// Files are grouped by their parent directory and each directory gets one
/// non-recursive OS watch, no matter how many of its files are registered.
/// A single background thread (the completion loop) owns every watch and the
/// registry; [`FileWatcher`] talks to it over a command channel.
///
/// A file counts as gone only when a removal or rename-away is reported for
/// its name *and* a follow-up attribute query says it does not exist. When
/// the OS drops notifications (buffer overflow) every watched name in the
/// directory is re-checked instead.
///
/// # Backends
///
/// - Windows: `ReadDirectoryChangesW` on overlapped directory handles, all
///   bound to one I/O completion port.
/// - Elsewhere: the `notify` crate's recommended watcher.
///
/// # Callbacks
///
/// The disappearance callback and the log sink run on the completion thread.
/// They must not call back into the same [`FileWatcher`]: the loop is busy
/// running them and would never answer.
mod completion;
pub mod records;
pub mod registry;
pub(crate) mod source;

#[cfg(windows)]
mod iocp;
#[cfg(not(windows))]
mod portable;

use crate::config::WatcherConfig;
use crate::error::WatchError;
use crate::log::SharedLog;
use completion::{Command, CompletionLoop};
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use registry::{WatchedDirectory, WatchedFile};
use source::{ChangeSource, Wake};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

pub use records::{ChangeAction, ChangeBatch, ChangeRecord};

/// Invoked with the path exactly as it was passed to
/// [`FileWatcher::add_file`].
pub type DisappearanceCallback = Box<dyn Fn(&Path) + Send + Sync>;

pub(crate) type SharedCallback = Arc<RwLock<Option<DisappearanceCallback>>>;

/// Handle to a running watcher.
///
/// Dropping the handle stops the completion loop and releases every OS
/// watch; [`FileWatcher::shutdown`] does the same and reports how the loop
/// ended.
pub struct FileWatcher {
    commands: Sender<Command>,
    waker: Arc<dyn Wake>,
    callback: SharedCallback,
    thread: Option<JoinHandle<Result<(), WatchError>>>,
}

impl FileWatcher {
    /// Create the change multiplexor and start the completion thread.
    pub fn start(config: WatcherConfig, log: SharedLog) -> Result<Self, WatchError> {
        let source = platform_source(&config)
            .map_err(|source| WatchError::MultiplexorUnavailable { source })?;
        Ok(Self::with_source(source, config.command_capacity, log))
    }

    pub(crate) fn with_source<S>(source: S, command_capacity: usize, log: SharedLog) -> Self
    where
        S: ChangeSource + Send + 'static,
    {
        let (commands, command_rx) = crossbeam_channel::bounded(command_capacity.max(1));
        let waker = source.waker();
        let callback: SharedCallback = Arc::new(RwLock::new(None));

        let event_loop = CompletionLoop::new(source, command_rx, Arc::clone(&callback), log);
        let thread = thread::Builder::new()
            .name("dupfinder-watcher".into())
            .spawn(move || event_loop.run())
            .expect("failed to spawn watcher thread");

        Self {
            commands,
            waker,
            callback,
            thread: Some(thread),
        }
    }

    /// Install (or replace) the disappearance callback.
    ///
    /// Disappearances detected before a callback is installed are dropped.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        *self.callback.write() = Some(Box::new(callback));
    }

    /// Start watching `path`, which must currently be a regular file.
    ///
    /// Blocks until the completion loop has armed the parent directory (if
    /// needed) and recorded the file. Registering the same file twice is a
    /// no-op.
    pub fn add_file(&self, path: &Path) -> Result<(), WatchError> {
        let (dir, file) = resolve(path)?;
        let (reply, reply_rx) = crossbeam_channel::bounded(1);
        self.send(Command::Add { dir, file, reply })?;
        reply_rx.recv().map_err(|_| WatchError::Stopped)?
    }

    /// Everything currently watched, sorted by directory.
    pub fn watched(&self) -> Result<Vec<WatchedDirectory>, WatchError> {
        let (reply, reply_rx) = crossbeam_channel::bounded(1);
        self.send(Command::Snapshot { reply })?;
        reply_rx.recv().map_err(|_| WatchError::Stopped)
    }

    /// Whether the completion loop is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the completion loop and wait for it to release every watch.
    ///
    /// Returns the error that stopped the loop early, if there was one.
    pub fn shutdown(mut self) -> Result<(), WatchError> {
        self.stop()
    }

    fn send(&self, command: Command) -> Result<(), WatchError> {
        self.commands.send(command).map_err(|_| WatchError::Stopped)?;
        self.waker.wake();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), WatchError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // A loop that already exited has dropped its receiver.
        let _ = self.send(Command::Shutdown);
        match thread.join() {
            Ok(outcome) => outcome,
            Err(_) => Err(WatchError::Stopped),
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            debug!("Watcher: stopped with {e}");
        }
    }
}

/// Split `path` into the registry key (canonical parent directory) and the
/// watched leaf.
fn resolve(path: &Path) -> Result<(PathBuf, WatchedFile), WatchError> {
    let not_a_file = || WatchError::NotARegularFile {
        path: path.to_path_buf(),
    };
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(not_a_file()),
    }
    let leaf = path.file_name().ok_or_else(not_a_file)?.to_os_string();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let dir = fs::canonicalize(parent).map_err(|source| WatchError::WatchSetupFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((
        dir,
        WatchedFile {
            leaf,
            registered: path.to_path_buf(),
        },
    ))
}

#[cfg(windows)]
fn platform_source(config: &WatcherConfig) -> std::io::Result<iocp::IocpSource> {
    iocp::IocpSource::new(config.buffer_size)
}

#[cfg(not(windows))]
fn platform_source(_config: &WatcherConfig) -> std::io::Result<portable::NotifySource> {
    portable::NotifySource::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_uses_the_canonical_parent() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        let file = tmp.path().join("sub").join("f.txt");
        fs::write(&file, "x").unwrap();

        let indirect = tmp.path().join("sub").join("..").join("sub").join("f.txt");
        let (dir, watched) = resolve(&indirect).unwrap();
        assert_eq!(dir, fs::canonicalize(tmp.path().join("sub")).unwrap());
        assert_eq!(watched.leaf, "f.txt");
        assert_eq!(watched.registered, indirect);
    }

    #[test]
    fn resolve_rejects_directories_and_missing_paths() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            resolve(tmp.path()),
            Err(WatchError::NotARegularFile { .. })
        ));
        assert!(matches!(
            resolve(&tmp.path().join("nope")),
            Err(WatchError::NotARegularFile { .. })
        ));
    }
}
