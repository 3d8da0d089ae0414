//! Depth-first enumeration of the regular files under a scan root.
//!
//! Uses `jwalk` with serial parallelism and name sorting so discovery order
//! is deterministic: the scanner stays on the caller's thread and equal
//! trees always produce classes in the same order.
//!
//! # Link policy
//!
//! Links are never followed for recursion, which rules out link cycles. A
//! link whose target is a regular file is reported once per link, under the
//! link's own path. Links to directories are ignored; dangling links are
//! reported as errors.
use std::fs;
use std::path::{Path, PathBuf};

/// One item produced by the walk.
#[derive(Debug)]
pub enum WalkItem {
    /// A regular file (or a link resolving to one) to hash.
    File(PathBuf),
    /// A file or directory that could not be examined.
    Error { path: PathBuf, reason: String },
}

/// Iterate the files under `root` in depth-first, name-sorted order.
pub fn walk_files(root: &Path, follow_file_links: bool) -> impl Iterator<Item = WalkItem> {
    jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .sort(true)
        .parallelism(jwalk::Parallelism::Serial)
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(mut entry) => {
                // A directory that cannot be listed still arrives as an
                // entry; its subtree is skipped.
                if let Some(err) = entry.read_children_error.take() {
                    return Some(walk_error(err, entry.path()));
                }
                let file_type = entry.file_type();
                if file_type.is_file() {
                    Some(WalkItem::File(entry.path()))
                } else if file_type.is_symlink() && follow_file_links {
                    resolve_link(entry.path())
                } else {
                    None
                }
            }
            Err(err) => Some(walk_error(err, PathBuf::new())),
        })
}

fn walk_error(err: jwalk::Error, fallback: PathBuf) -> WalkItem {
    let path = err.path().map(Path::to_path_buf).unwrap_or(fallback);
    let reason = match err.io_error() {
        Some(io) => io.to_string(),
        None => err.to_string(),
    };
    WalkItem::Error { path, reason }
}

fn resolve_link(path: PathBuf) -> Option<WalkItem> {
    match fs::metadata(&path) {
        Ok(meta) if meta.is_file() => Some(WalkItem::File(path)),
        Ok(_) => None,
        Err(err) => Some(WalkItem::Error {
            path,
            reason: err.to_string(),
        }),
    }
}
