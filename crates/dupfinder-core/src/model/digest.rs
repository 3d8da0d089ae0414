//! 256-bit content fingerprint of a regular file.
//!
//! Two files with an equal digest are treated as duplicates. The canonical
//! text form is 64 lowercase hex characters with no prefix or separators;
//! it is what appears in logs, reports and serialised output.
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of bytes in a digest.
pub const DIGEST_LEN: usize = 32;

/// SHA-256 of a file's full byte stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileDigest([u8; DIGEST_LEN]);

impl FileDigest {
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileDigest({})", self.to_hex())
    }
}

/// The text was not 64 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid digest {input:?}: expected 64 hex characters")]
pub struct ParseDigestError {
    input: String,
}

impl FromStr for FileDigest {
    type Err = ParseDigestError;

    /// Accepts either case; the canonical form is produced on output only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseDigestError {
            input: s.to_owned(),
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for FileDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FileDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hex_is_lowercase_and_64_chars() {
        let d: FileDigest = EMPTY_SHA256.to_uppercase().parse().unwrap();
        let text = d.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text, EMPTY_SHA256);
    }

    #[test]
    fn rejects_wrong_length_and_garbage() {
        assert!("abcd".parse::<FileDigest>().is_err());
        assert!("zz".repeat(32).parse::<FileDigest>().is_err());
        assert!(format!("0x{}", &EMPTY_SHA256[2..])
            .parse::<FileDigest>()
            .is_err());
    }

    #[test]
    fn debug_shows_hex() {
        let d = FileDigest::from_bytes([0xab; DIGEST_LEN]);
        assert_eq!(format!("{d:?}"), format!("FileDigest({})", "ab".repeat(32)));
    }
}
