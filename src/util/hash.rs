//! Hash utilities
//!
//! SHA1 digests of files on disk.

use sha1::{Digest, Sha1};
use std::io::Read;
use std::path::Path;

/// Calculate SHA1 hash of everything a reader yields
pub fn sha1_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha1::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Calculate SHA1 hash of a file
pub fn sha1_file(path: &Path) -> std::io::Result<String> {
    sha1_reader(std::fs::File::open(path)?)
}
