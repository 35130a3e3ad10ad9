//! Filesystem helpers for writing artifacts atomically.
//!
//! Every artifact is written under a temporary name in its destination
//! directory and renamed into place, so an interrupted run never leaves a
//! partially written artifact that a later run would mistake for a finished one.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

fn temp_sibling(path: &Path, suffix: &str) -> MediaResult<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| MediaError::internal(format!("path has no file name: {}", path.display())))?;
    let mut tmp = name.to_os_string();
    tmp.push(suffix);
    Ok(path.with_file_name(tmp))
}

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Write `contents` to `path` via a temporary sibling file and rename.
pub async fn write_atomic(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> MediaResult<()> {
    let path = path.as_ref();
    ensure_parent(path).await?;

    let tmp = temp_sibling(path, ".tmp")?;
    fs::write(&tmp, contents).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> MediaResult<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, json).await
}

/// Replace directory `dst` with the fully populated directory `staged`.
///
/// `staged` must live on the same filesystem as `dst`. Any existing `dst`
/// is removed first.
pub async fn replace_dir(staged: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let staged = staged.as_ref();
    let dst = dst.as_ref();

    if !staged.is_dir() {
        return Err(MediaError::FileNotFound(staged.to_path_buf()));
    }
    ensure_parent(dst).await?;
    if dst.exists() {
        tracing::debug!("Replacing existing directory {}", dst.display());
        fs::remove_dir_all(dst).await?;
    }
    fs::rename(staged, dst).await?;
    Ok(())
}

/// Staging directory path for `dst`, next to it on the same filesystem.
pub fn staging_dir(dst: &Path) -> MediaResult<PathBuf> {
    temp_sibling(dst, ".staging")
}
