//! Which files are watched, grouped by parent directory.
//!
//! Owned by the completion thread; nothing here is shared or locked. A
//! directory entry exists exactly as long as it holds at least one file and
//! its OS watch is armed.
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// One watched file: its leaf name inside the directory and the path the
/// caller registered (reported back verbatim on disappearance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFile {
    pub leaf: OsString,
    pub registered: PathBuf,
}

#[derive(Debug, Default)]
struct DirectoryEntry {
    files: Vec<WatchedFile>,
}

/// Result of removing a file from its directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    NotWatched,
    /// Other files are still watched in the directory.
    Remaining(usize),
    /// That was the last one; the directory entry is gone.
    Emptied,
}

/// A read-only view of one directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchedDirectory {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct WatchRegistry {
    dirs: HashMap<PathBuf, DirectoryEntry>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains_key(dir)
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    /// Record `file` under `dir`. Returns `false` if that leaf was already
    /// watched there (the registration is not duplicated).
    pub fn insert(&mut self, dir: PathBuf, file: WatchedFile) -> bool {
        let entry = self.dirs.entry(dir).or_default();
        if entry.files.iter().any(|f| f.leaf == file.leaf) {
            return false;
        }
        entry.files.push(file);
        true
    }

    pub fn find(&self, dir: &Path, leaf: &OsStr) -> Option<&WatchedFile> {
        self.dirs
            .get(dir)?
            .files
            .iter()
            .find(|f| f.leaf.as_os_str() == leaf)
    }

    pub fn remove_file(&mut self, dir: &Path, leaf: &OsStr) -> Removal {
        let Some(entry) = self.dirs.get_mut(dir) else {
            return Removal::NotWatched;
        };
        let Some(pos) = entry.files.iter().position(|f| f.leaf.as_os_str() == leaf) else {
            return Removal::NotWatched;
        };
        entry.files.remove(pos);
        if entry.files.is_empty() {
            self.dirs.remove(dir);
            Removal::Emptied
        } else {
            Removal::Remaining(entry.files.len())
        }
    }

    /// Drop a whole directory entry, returning the files it held.
    pub fn remove_dir(&mut self, dir: &Path) -> Vec<WatchedFile> {
        self.dirs
            .remove(dir)
            .map(|entry| entry.files)
            .unwrap_or_default()
    }

    /// Every watched file in `dir`, in registration order.
    pub fn files(&self, dir: &Path) -> Vec<WatchedFile> {
        self.dirs
            .get(dir)
            .map(|entry| entry.files.clone())
            .unwrap_or_default()
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs.keys().cloned().collect()
    }

    /// All entries, sorted by directory.
    pub fn snapshot(&self) -> Vec<WatchedDirectory> {
        let mut out: Vec<WatchedDirectory> = self
            .dirs
            .iter()
            .map(|(dir, entry)| WatchedDirectory {
                dir: dir.clone(),
                files: entry.files.iter().map(|f| f.registered.clone()).collect(),
            })
            .collect();
        out.sort_by(|a, b| a.dir.cmp(&b.dir));
        out
    }
}
