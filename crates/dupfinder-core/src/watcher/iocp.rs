/// Windows change source: `ReadDirectoryChangesW` with overlapped I/O, every
/// directory handle bound to one I/O completion port.
///
/// Each armed directory owns a boxed [`PendingWatch`] holding its handle,
/// its `OVERLAPPED` and its change buffer. The box must not move or be freed
/// while a request is outstanding, so a watch released with a request still
/// in flight is parked in `retired` until the kernel posts the cancelled
/// completion.
///
/// Commands are signalled by posting an empty packet with [`WAKE_KEY`] to the
/// port; directory keys start at 1.
use super::completion::Command;
use super::records::{parse_notify_buffer, ChangeBatch};
use super::source::{ChangeSource, Wake, Wakeup};
use crate::platform::to_wide;
use crossbeam_channel::{Receiver, TryRecvError};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE, WIN32_ERROR};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, ReadDirectoryChangesW, FILE_FLAGS_AND_ATTRIBUTES, FILE_FLAG_BACKUP_SEMANTICS,
    FILE_FLAG_OVERLAPPED, FILE_LIST_DIRECTORY, FILE_NOTIFY_CHANGE_FILE_NAME, FILE_SHARE_DELETE,
    FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::IO::{
    CancelIoEx, CreateIoCompletionPort, GetQueuedCompletionStatus, PostQueuedCompletionStatus,
    OVERLAPPED,
};

/// Completion key of the wake packet.
const WAKE_KEY: usize = 0;

const INFINITE: u32 = u32::MAX;

/// The change buffer overflowed before the request could be completed.
const ERROR_NOTIFY_ENUM_DIR: WIN32_ERROR = WIN32_ERROR(1022);

/// How long teardown waits for cancelled requests to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Owned completion port handle.
struct Port(HANDLE);

// SAFETY: a completion port handle may be used from any thread.
unsafe impl Send for Port {}
unsafe impl Sync for Port {}

impl Drop for Port {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by CreateIoCompletionPort and is
        // closed exactly once.
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

struct PortWaker(Arc<Port>);

impl Wake for PortWaker {
    fn wake(&self) {
        // SAFETY: the port outlives this call through the Arc.
        if let Err(e) = unsafe { PostQueuedCompletionStatus(self.0 .0, 0, WAKE_KEY, None) } {
            warn!("Watcher: failed to post wake packet: {e}");
        }
    }
}

struct PendingWatch {
    dir: PathBuf,
    handle: HANDLE,
    overlapped: OVERLAPPED,
    /// `u32` words keep the buffer DWORD-aligned as the API requires.
    buffer: Vec<u32>,
    in_flight: bool,
}

impl PendingWatch {
    /// Issue the next `ReadDirectoryChangesW` request.
    fn issue(&mut self) -> io::Result<()> {
        self.overlapped = OVERLAPPED::default();
        let len = (self.buffer.len() * 4) as u32;
        // SAFETY: `self` is boxed and stays at a fixed address until the
        // request completes; the buffer and OVERLAPPED live inside it.
        unsafe {
            ReadDirectoryChangesW(
                self.handle,
                self.buffer.as_mut_ptr() as *mut core::ffi::c_void,
                len,
                false, // only the directory itself
                FILE_NOTIFY_CHANGE_FILE_NAME,
                None,
                Some(&mut self.overlapped as *mut OVERLAPPED),
                None,
            )
        }
        .map_err(io::Error::from)?;
        self.in_flight = true;
        Ok(())
    }

    fn bytes(&self, transferred: u32) -> &[u8] {
        let len = (transferred as usize).min(self.buffer.len() * 4);
        // SAFETY: the buffer is at least `len` bytes and any bit pattern is a
        // valid u8.
        unsafe { std::slice::from_raw_parts(self.buffer.as_ptr() as *const u8, len) }
    }

    fn close(&mut self) {
        if self.in_flight {
            // SAFETY: handle and OVERLAPPED belong to the outstanding request.
            unsafe {
                let _ = CancelIoEx(self.handle, Some(&self.overlapped as *const OVERLAPPED));
            }
        }
        // SAFETY: the handle was opened by CreateFileW and is closed once.
        unsafe {
            let _ = CloseHandle(self.handle);
        }
        self.handle = HANDLE::default();
    }
}

pub(crate) struct IocpSource {
    port: Arc<Port>,
    buffer_words: usize,
    next_key: usize,
    by_dir: HashMap<PathBuf, usize>,
    watches: HashMap<usize, Box<PendingWatch>>,
    /// Released watches whose cancelled request has not completed yet.
    retired: HashMap<usize, Box<PendingWatch>>,
}

// SAFETY: the raw handles and OVERLAPPED pointers are only touched by the
// thread that owns the source.
unsafe impl Send for IocpSource {}

impl IocpSource {
    pub(crate) fn new(buffer_size: usize) -> io::Result<Self> {
        // SAFETY: creating a fresh port not associated with any file.
        let port = unsafe {
            CreateIoCompletionPort(
                windows::Win32::Foundation::INVALID_HANDLE_VALUE,
                HANDLE::default(),
                0,
                1,
            )
        }
        .map_err(io::Error::from)?;
        Ok(Self {
            port: Arc::new(Port(port)),
            buffer_words: buffer_size.div_ceil(4).max(1),
            next_key: WAKE_KEY + 1,
            by_dir: HashMap::new(),
            watches: HashMap::new(),
            retired: HashMap::new(),
        })
    }

    fn open_directory(dir: &Path) -> io::Result<HANDLE> {
        let wide = to_wide(dir);
        // SAFETY: `wide` is NUL-terminated and outlives the call.
        unsafe {
            CreateFileW(
                PCWSTR(wide.as_ptr()),
                FILE_LIST_DIRECTORY.0,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                None,
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(FILE_FLAG_BACKUP_SEMANTICS.0 | FILE_FLAG_OVERLAPPED.0),
                None,
            )
        }
        .map_err(io::Error::from)
    }
}

impl ChangeSource for IocpSource {
    fn arm(&mut self, dir: &Path) -> io::Result<()> {
        let handle = Self::open_directory(dir)?;
        let key = self.next_key;

        // SAFETY: binds a handle we own to our port.
        if let Err(e) = unsafe { CreateIoCompletionPort(handle, self.port.0, key, 0) } {
            unsafe {
                let _ = CloseHandle(handle);
            }
            return Err(e.into());
        }

        let mut watch = Box::new(PendingWatch {
            dir: dir.to_path_buf(),
            handle,
            overlapped: OVERLAPPED::default(),
            buffer: vec![0u32; self.buffer_words],
            in_flight: false,
        });
        if let Err(e) = watch.issue() {
            watch.close();
            return Err(e);
        }

        self.next_key += 1;
        self.by_dir.insert(dir.to_path_buf(), key);
        self.watches.insert(key, watch);
        Ok(())
    }

    fn rearm(&mut self, dir: &Path) -> io::Result<()> {
        let watch = self
            .by_dir
            .get(dir)
            .and_then(|key| self.watches.get_mut(key))
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        watch.issue()
    }

    fn disarm(&mut self, dir: &Path) {
        let Some(key) = self.by_dir.remove(dir) else {
            return;
        };
        let Some(mut watch) = self.watches.remove(&key) else {
            return;
        };
        let in_flight = watch.in_flight;
        watch.close();
        if in_flight {
            self.retired.insert(key, watch);
        }
    }

    fn next_wakeup(&mut self, commands: &Receiver<Command>) -> io::Result<Wakeup> {
        loop {
            match commands.try_recv() {
                Ok(command) => return Ok(Wakeup::Command(command)),
                Err(TryRecvError::Disconnected) => return Ok(Wakeup::Shutdown),
                Err(TryRecvError::Empty) => {}
            }

            let mut transferred = 0u32;
            let mut key = 0usize;
            let mut overlapped: *mut OVERLAPPED = std::ptr::null_mut();
            // SAFETY: all out-pointers are valid locals.
            let status = unsafe {
                GetQueuedCompletionStatus(
                    self.port.0,
                    &mut transferred,
                    &mut key,
                    &mut overlapped,
                    INFINITE,
                )
            };

            if overlapped.is_null() {
                // A wake packet, or the port itself failed.
                match status {
                    Ok(()) => continue,
                    Err(e) => return Err(e.into()),
                }
            }

            if self.retired.remove(&key).is_some() {
                debug!("Watcher: cancelled request {key} drained");
                continue;
            }
            let Some(watch) = self.watches.get_mut(&key) else {
                continue;
            };
            watch.in_flight = false;
            let dir = watch.dir.clone();

            if let Err(e) = status {
                let error = io::Error::from(e);
                if error.raw_os_error() == Some(ERROR_NOTIFY_ENUM_DIR.0 as i32) {
                    return Ok(Wakeup::Batch(ChangeBatch::overflow(dir)));
                }
                return Ok(Wakeup::WatchFailed { dir, error });
            }
            if transferred == 0 {
                return Ok(Wakeup::Batch(ChangeBatch::overflow(dir)));
            }
            let records = parse_notify_buffer(watch.bytes(transferred));
            return Ok(Wakeup::Batch(ChangeBatch::new(dir, records)));
        }
    }

    fn waker(&self) -> Arc<dyn Wake> {
        Arc::new(PortWaker(Arc::clone(&self.port)))
    }
}

impl Drop for IocpSource {
    fn drop(&mut self) {
        for (key, mut watch) in self.watches.drain() {
            let in_flight = watch.in_flight;
            watch.close();
            if in_flight {
                self.retired.insert(key, watch);
            }
        }

        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while !self.retired.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let mut transferred = 0u32;
            let mut key = 0usize;
            let mut overlapped: *mut OVERLAPPED = std::ptr::null_mut();
            // SAFETY: all out-pointers are valid locals.
            let status = unsafe {
                GetQueuedCompletionStatus(
                    self.port.0,
                    &mut transferred,
                    &mut key,
                    &mut overlapped,
                    remaining.as_millis() as u32,
                )
            };
            if overlapped.is_null() && status.is_err() {
                break;
            }
            self.retired.remove(&key);
        }

        if !self.retired.is_empty() {
            // The kernel may still write into these; leaking beats a
            // use-after-free.
            warn!(
                count = self.retired.len(),
                "Watcher: cancelled requests did not drain"
            );
            for (_, watch) in self.retired.drain() {
                std::mem::forget(watch);
            }
        }
    }
}
