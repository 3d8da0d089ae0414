//! A copy of the scan result kept in sync with disappearance reports while
//! `--watch` runs.
use dupfinder_core::{DuplicateClass, FileDigest, ScanResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What a disappearance did to the open classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// The path does not belong to an open class.
    Untracked,
    /// The class still holds duplicates.
    Shrunk {
        digest: FileDigest,
        remaining: usize,
    },
    /// Fewer than two members are left; the class is closed.
    Resolved {
        digest: FileDigest,
        survivor: Option<PathBuf>,
    },
}

impl Update {
    /// The line printed for this update, if any.
    pub fn describe(&self, path: &Path) -> Option<String> {
        match self {
            Self::Untracked => None,
            Self::Shrunk { remaining, .. } => Some(format!(
                "Removed {} ({remaining} copies left)",
                path.display()
            )),
            Self::Resolved {
                digest,
                survivor: Some(kept),
            } => Some(format!(
                "Removed {}; class {} resolved, kept {}",
                path.display(),
                digest,
                kept.display()
            )),
            Self::Resolved {
                digest,
                survivor: None,
            } => Some(format!(
                "Removed {}; class {} resolved, no copies left",
                path.display(),
                digest
            )),
        }
    }
}

#[derive(Debug, Default)]
pub struct LiveResults {
    classes: HashMap<FileDigest, DuplicateClass>,
    owner: HashMap<PathBuf, FileDigest>,
}

impl LiveResults {
    pub fn new(result: &ScanResult) -> Self {
        let mut live = Self::default();
        for class in result.iter() {
            for path in &class.paths {
                live.owner.insert(path.clone(), class.digest);
            }
            live.classes.insert(class.digest, class.clone());
        }
        live
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Every path still tracked.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.owner.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.owner.contains_key(path)
    }

    /// Stop tracking the whole class `path` belongs to. Returns its digest
    /// and member count.
    pub fn abandon(&mut self, path: &Path) -> Option<(FileDigest, usize)> {
        let digest = *self.owner.get(path)?;
        let class = self.classes.remove(&digest)?;
        for member in &class.paths {
            self.owner.remove(member);
        }
        Some((digest, class.paths.len()))
    }

    pub fn remove(&mut self, path: &Path) -> Update {
        let Some(digest) = self.owner.remove(path) else {
            return Update::Untracked;
        };
        let Some(class) = self.classes.get_mut(&digest) else {
            return Update::Untracked;
        };
        class.paths.retain(|p| p != path);

        if class.paths.len() >= 2 {
            return Update::Shrunk {
                digest,
                remaining: class.paths.len(),
            };
        }

        let survivor = class.paths.first().cloned();
        if let Some(kept) = &survivor {
            self.owner.remove(kept);
        }
        self.classes.remove(&digest);
        Update::Resolved { digest, survivor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dupfinder_core::model::ClassAccumulator;

    fn result() -> ScanResult {
        let three = FileDigest::from_bytes([3; 32]);
        let two = FileDigest::from_bytes([2; 32]);
        let mut acc = ClassAccumulator::new();
        for p in ["/d1/a", "/d1/b", "/d2/c"] {
            acc.insert(three, 1, PathBuf::from(p));
        }
        for p in ["/x", "/y"] {
            acc.insert(two, 1, PathBuf::from(p));
        }
        acc.finish()
    }

    #[test]
    fn class_shrinks_then_resolves() {
        let mut live = LiveResults::new(&result());
        assert_eq!(live.len(), 2);
        assert_eq!(live.paths().len(), 5);

        let digest = FileDigest::from_bytes([3; 32]);
        assert_eq!(
            live.remove(Path::new("/d1/a")),
            Update::Shrunk {
                digest,
                remaining: 2
            }
        );
        assert_eq!(
            live.remove(Path::new("/d2/c")),
            Update::Resolved {
                digest,
                survivor: Some(PathBuf::from("/d1/b"))
            }
        );
        assert_eq!(live.len(), 1);
        // The survivor is no longer tracked.
        assert_eq!(live.remove(Path::new("/d1/b")), Update::Untracked);
    }

    #[test]
    fn unknown_and_repeated_paths_are_untracked() {
        let mut live = LiveResults::new(&result());
        assert_eq!(live.remove(Path::new("/nowhere")), Update::Untracked);
        assert!(matches!(live.remove(Path::new("/x")), Update::Resolved { .. }));
        assert_eq!(live.remove(Path::new("/x")), Update::Untracked);
        assert_eq!(live.remove(Path::new("/y")), Update::Untracked);
    }

    #[test]
    fn empties_when_every_class_resolves() {
        let mut live = LiveResults::new(&result());
        live.remove(Path::new("/x"));
        live.remove(Path::new("/d1/a"));
        live.remove(Path::new("/d1/b"));
        assert!(live.is_empty());
        assert!(live.paths().is_empty());
    }

    #[test]
    fn abandoning_a_member_drops_its_class() {
        let mut live = LiveResults::new(&result());
        let digest = FileDigest::from_bytes([3; 32]);

        assert_eq!(live.abandon(Path::new("/d1/b")), Some((digest, 3)));
        assert_eq!(live.len(), 1);
        for gone in ["/d1/a", "/d1/b", "/d2/c"] {
            assert!(!live.contains(Path::new(gone)));
            assert_eq!(live.remove(Path::new(gone)), Update::Untracked);
        }
        assert!(live.contains(Path::new("/x")));
        assert_eq!(live.abandon(Path::new("/d1/a")), None);
        assert_eq!(live.abandon(Path::new("/nowhere")), None);
    }

    #[test]
    fn descriptions() {
        let digest = FileDigest::from_bytes([0; 32]);
        let p = Path::new("/gone");
        assert_eq!(Update::Untracked.describe(p), None);
        assert_eq!(
            Update::Shrunk {
                digest,
                remaining: 3
            }
            .describe(p)
            .unwrap(),
            "Removed /gone (3 copies left)"
        );
        let resolved = Update::Resolved {
            digest,
            survivor: Some(PathBuf::from("/kept")),
        }
        .describe(p)
        .unwrap();
        assert!(resolved.ends_with("resolved, kept /kept"), "{resolved}");
    }
}
