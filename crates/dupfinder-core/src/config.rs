//! Tunables for the scanner and the watcher.
//!
//! Everything has a sensible default; collaborators only override what they
//! expose to users.

/// Size of the read buffer used to stream a file into the hasher.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Size of the per-directory change buffer.
///
/// One buffer holds one batch of change records. 64 KiB is the largest
/// buffer `ReadDirectoryChangesW` accepts for network shares.
pub const DEFAULT_CHANGE_BUFFER_SIZE: usize = 64 * 1024;

/// Maximum number of commands that may queue up for the completion loop.
pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

/// Options for a single scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Bytes read per chunk while hashing. Clamped to at least 1.
    pub chunk_size: usize,
    /// Hash symbolic links whose target is a regular file. Directory links
    /// are never recursed into.
    pub follow_file_links: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            follow_file_links: true,
        }
    }
}

impl ScanOptions {
    pub(crate) fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

/// Options for a [`crate::watcher::FileWatcher`].
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Bytes in each directory's change buffer (Windows backend). Rounded up
    /// to a whole number of 32-bit words.
    pub buffer_size: usize,
    /// Capacity of the command channel feeding the completion loop.
    pub command_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_CHANGE_BUFFER_SIZE,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}
