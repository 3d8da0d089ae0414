//! Change records delivered by a directory watch.
//!
//! The Windows backend receives a packed chain of `FILE_NOTIFY_INFORMATION`
//! records; [`parse_notify_buffer`] turns one completed buffer into owned
//! [`ChangeRecord`]s so the buffer can be handed straight back to the kernel.
//! The parser is plain byte arithmetic and is exercised on every platform.
use std::ffi::OsString;
use std::path::PathBuf;

const FILE_ACTION_ADDED: u32 = 1;
const FILE_ACTION_REMOVED: u32 = 2;
const FILE_ACTION_MODIFIED: u32 = 3;
const FILE_ACTION_RENAMED_OLD_NAME: u32 = 4;
const FILE_ACTION_RENAMED_NEW_NAME: u32 = 5;

/// `NextEntryOffset`, `Action` and `FileNameLength`, each a `u32`.
const RECORD_HEADER_LEN: usize = 12;

/// What happened to a name inside a watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Added,
    Removed,
    Modified,
    RenamedOldName,
    RenamedNewName,
    Other(u32),
}

impl ChangeAction {
    pub fn from_raw(action: u32) -> Self {
        match action {
            FILE_ACTION_ADDED => Self::Added,
            FILE_ACTION_REMOVED => Self::Removed,
            FILE_ACTION_MODIFIED => Self::Modified,
            FILE_ACTION_RENAMED_OLD_NAME => Self::RenamedOldName,
            FILE_ACTION_RENAMED_NEW_NAME => Self::RenamedNewName,
            other => Self::Other(other),
        }
    }

    /// The name no longer refers to what it did: a removal, or the old half
    /// of a rename.
    pub fn is_departure(self) -> bool {
        matches!(self, Self::Removed | Self::RenamedOldName)
    }
}

/// One (action, leaf name) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub action: ChangeAction,
    /// Name relative to the watched directory.
    pub name: OsString,
}

impl ChangeRecord {
    pub fn new(action: ChangeAction, name: impl Into<OsString>) -> Self {
        Self {
            action,
            name: name.into(),
        }
    }
}

/// One completed batch for one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    /// Registry key of the directory the batch belongs to.
    pub dir: PathBuf,
    pub records: Vec<ChangeRecord>,
    /// The OS dropped changes (buffer overflow). Every watched name in the
    /// directory has to be re-checked.
    pub overflowed: bool,
}

impl ChangeBatch {
    pub fn new(dir: PathBuf, records: Vec<ChangeRecord>) -> Self {
        Self {
            dir,
            records,
            overflowed: false,
        }
    }

    pub fn overflow(dir: PathBuf) -> Self {
        Self {
            dir,
            records: Vec::new(),
            overflowed: true,
        }
    }
}

/// Parse a `FILE_NOTIFY_INFORMATION` chain.
///
/// `buffer` must hold exactly the bytes the kernel reported as transferred.
/// Parsing stops at the first record that would run past the end, so a
/// truncated buffer yields the records before the damage.
pub fn parse_notify_buffer(buffer: &[u8]) -> Vec<ChangeRecord> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    loop {
        let (Some(next), Some(action), Some(name_len)) = (
            read_u32(buffer, offset),
            read_u32(buffer, offset + 4),
            read_u32(buffer, offset + 8),
        ) else {
            break;
        };

        let name_start = offset + RECORD_HEADER_LEN;
        let Some(name_bytes) = buffer.get(name_start..name_start + name_len as usize) else {
            break;
        };
        let units: Vec<u16> = name_bytes
            .chunks_exact(2)
            .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
            .collect();

        records.push(ChangeRecord {
            action: ChangeAction::from_raw(action),
            name: name_from_utf16(&units),
        });

        if next == 0 {
            break;
        }
        offset += next as usize;
    }

    records
}

fn read_u32(buffer: &[u8], at: usize) -> Option<u32> {
    let bytes = buffer.get(at..at + 4)?;
    Some(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(windows)]
fn name_from_utf16(units: &[u16]) -> OsString {
    use std::os::windows::ffi::OsStringExt;
    OsString::from_wide(units)
}

#[cfg(not(windows))]
fn name_from_utf16(units: &[u16]) -> OsString {
    OsString::from(String::from_utf16_lossy(units))
}
