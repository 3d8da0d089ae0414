//! Streaming SHA-256 over a file's full contents.
//!
//! Memory use is bounded by one chunk buffer, reused for every file the
//! hasher sees.
use crate::model::FileDigest;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Reusable chunked hasher.
pub struct FileHasher {
    buffer: Vec<u8>,
}

impl FileHasher {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            buffer: vec![0u8; chunk_size.max(1)],
        }
    }

    /// Digest and byte length of the file at `path`.
    pub fn hash_file(&mut self, path: &Path) -> io::Result<(FileDigest, u64)> {
        let file = File::open(path)?;
        self.hash_reader(file)
    }

    /// Digest and byte length of everything `reader` yields.
    pub fn hash_reader<R: Read>(&mut self, mut reader: R) -> io::Result<(FileDigest, u64)> {
        let mut hasher = Sha256::new();
        let mut total: u64 = 0;
        loop {
            let n = match reader.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&self.buffer[..n]);
            total += n as u64;
        }
        let bytes: [u8; 32] = hasher.finalize().into();
        Ok((FileDigest::from_bytes(bytes), total))
    }
}
