//! Equivalence classes of identical files and the per-scan result set.
use super::digest::FileDigest;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Files sharing one digest. Always holds at least two paths once it leaves
/// the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateClass {
    pub digest: FileDigest,
    /// Size of each member in bytes.
    pub size: u64,
    /// Member paths in discovery order.
    pub paths: Vec<PathBuf>,
}

impl DuplicateClass {
    /// Bytes freed by keeping a single copy.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.size
            .saturating_mul(self.paths.len().saturating_sub(1) as u64)
    }
}

/// The outcome of one scan: every class of two or more identical files.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    classes: HashMap<FileDigest, DuplicateClass>,
    /// Files successfully hashed during the walk.
    pub files_hashed: u64,
    /// Files (or directories) skipped because of an I/O error.
    pub errors: u64,
}

impl ScanResult {
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, digest: &FileDigest) -> Option<&DuplicateClass> {
        self.classes.get(digest)
    }

    /// Classes in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &DuplicateClass> {
        self.classes.values()
    }

    /// Classes ordered by reclaimable bytes (largest first), then digest.
    pub fn sorted_classes(&self) -> Vec<&DuplicateClass> {
        let mut out: Vec<&DuplicateClass> = self.classes.values().collect();
        out.sort_by(|a, b| {
            b.reclaimable_bytes()
                .cmp(&a.reclaimable_bytes())
                .then_with(|| a.digest.cmp(&b.digest))
        });
        out
    }

    pub fn reclaimable_bytes(&self) -> u64 {
        self.classes
            .values()
            .map(DuplicateClass::reclaimable_bytes)
            .sum()
    }

    /// Total number of paths across all classes.
    pub fn path_count(&self) -> usize {
        self.classes.values().map(|c| c.paths.len()).sum()
    }
}

impl IntoIterator for ScanResult {
    type Item = DuplicateClass;
    type IntoIter = std::collections::hash_map::IntoValues<FileDigest, DuplicateClass>;

    fn into_iter(self) -> Self::IntoIter {
        self.classes.into_values()
    }
}

/// Collects (digest, path) pairs during a walk.
///
/// Appends preserve discovery order. [`ClassAccumulator::finish`] prunes
/// every digest seen only once.
#[derive(Debug, Default)]
pub struct ClassAccumulator {
    by_digest: HashMap<FileDigest, DuplicateClass>,
    files_hashed: u64,
    errors: u64,
}

impl ClassAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, digest: FileDigest, size: u64, path: PathBuf) {
        self.files_hashed += 1;
        self.by_digest
            .entry(digest)
            .or_insert_with(|| DuplicateClass {
                digest,
                size,
                paths: Vec::with_capacity(2),
            })
            .paths
            .push(path);
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn finish(mut self) -> ScanResult {
        self.by_digest.retain(|_, class| class.paths.len() >= 2);
        ScanResult {
            classes: self.by_digest,
            files_hashed: self.files_hashed,
            errors: self.errors,
        }
    }
}
