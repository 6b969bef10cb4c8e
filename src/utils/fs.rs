// src/utils/fs.rs

//! Filesystem helpers.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Ensure `dir` exists as a directory, creating it and its parents.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(AppError::config(format!(
            "{} exists but is not a directory",
            dir.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(dir).await?;
            log::debug!("Created directory {}", dir.display());
            Ok(())
        }
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Temporary sibling path used for atomic writes.
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
