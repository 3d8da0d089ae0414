//! Attribute queries used to confirm a disappearance.
//!
//! A change notification only says a name changed. Before a file is
//! reported gone its path is queried once more, and only a definite "not
//! found" from the OS counts. Any other failure (a permission error, a
//! sharing violation) leaves the file registered.
use std::path::Path;

/// `true` when the OS reports that nothing exists at `path`.
#[cfg(windows)]
pub fn is_confirmed_absent(path: &Path) -> bool {
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{GetLastError, ERROR_FILE_NOT_FOUND};
    use windows::Win32::Storage::FileSystem::{GetFileAttributesW, INVALID_FILE_ATTRIBUTES};

    let wide = to_wide(path);
    // SAFETY: `wide` is a NUL-terminated UTF-16 buffer that outlives the call.
    unsafe {
        GetFileAttributesW(PCWSTR(wide.as_ptr())) == INVALID_FILE_ATTRIBUTES
            && GetLastError() == ERROR_FILE_NOT_FOUND
    }
}

/// `true` when the OS reports that nothing exists at `path`.
#[cfg(not(windows))]
pub fn is_confirmed_absent(path: &Path) -> bool {
    matches!(
        std::fs::symlink_metadata(path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound
    )
}

/// Null-terminated UTF-16 copy of `path` for Win32 calls.
#[cfg(windows)]
pub(crate) fn to_wide(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;

    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0u16))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn existing_file_is_not_absent() {
        let tmp = TempDir::new().unwrap();
        let f = tmp.path().join("here.txt");
        std::fs::write(&f, "x").unwrap();
        assert!(!is_confirmed_absent(&f));
        assert!(!is_confirmed_absent(tmp.path()));
    }

    #[test]
    fn deleted_file_is_absent() {
        let tmp = TempDir::new().unwrap();
        let f = tmp.path().join("gone.txt");
        std::fs::write(&f, "x").unwrap();
        std::fs::remove_file(&f).unwrap();
        assert!(is_confirmed_absent(&f));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_still_exists_as_a_name() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(tmp.path().join("missing"), &link).unwrap();
        assert!(!is_confirmed_absent(&link));
    }
}
