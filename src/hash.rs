//! xxHash content digests for verifying copied files

use crate::error::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::trace;
use xxhash_rust::xxh3::Xxh3;

/// Read buffer size (256KB)
const CHUNK_SIZE: usize = 256 * 1024;

/// Compute the xxh3 digest of a file's full contents
pub fn content_digest(path: &Path) -> Result<u64> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut hasher = Xxh3::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let digest = hasher.digest();
    trace!(?path, digest, "Computed content digest");
    Ok(digest)
}

/// Check that two files have identical length and contents
pub fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    if std::fs::metadata(a)?.len() != std::fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(content_digest(a)? == content_digest(b)?)
}
