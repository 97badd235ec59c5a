//! Utility module
//!
//! Common utilities used across the application.

pub mod hash;

use std::path::{Path, PathBuf};

/// Get the data directory for sha1bench
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("sha1bench")
}

/// Write a file, creating parent directories first
pub fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    tracing::debug!("Wrote {} bytes to {:?}", bytes.len(), path);
    Ok(())
}
