//! File lifecycle helpers shared by the job stores.
//!
//! Records are never written in place: data goes to a dot-prefixed temp file
//! next to the destination, is fsynced, and is atomically renamed over the
//! destination. The parent directory is fsynced afterwards so the rename
//! itself survives a crash. Once the rename has happened the new contents are
//! visible, so a failed directory fsync is logged rather than returned.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Path for the temp file: same directory, dot prefix and `.tmp` suffix
/// (e.g. `jobs/abc.json` → `jobs/.abc.json.tmp`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    if let Some(file_name) = final_path.file_name() {
        name.push(file_name);
    }
    name.push(TEMP_SUFFIX);
    final_path.with_file_name(name)
}

/// True for names produced by [`temp_path`]; listings skip these.
pub fn is_temp_name(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(TEMP_SUFFIX)
}

/// Replace `path` with `data` atomically: readers observe either the old or
/// the new contents, never a mix. On failure the temp file is removed and the
/// previous contents stay in place.
pub async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);
    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        if let Err(rm) = tokio::fs::remove_file(&tmp).await {
            if rm.kind() != io::ErrorKind::NotFound {
                tracing::debug!(path = %tmp.display(), "could not remove temp file: {}", rm);
            }
        }
        return Err(e);
    }

    sync_parent_dir_or_warn(path).await;
    Ok(())
}

/// Remove `path`, treating a missing file as success.
pub async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            sync_parent_dir_or_warn(path).await;
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

async fn sync_parent_dir_or_warn(path: &Path) {
    if let Err(e) = sync_parent_dir(path).await {
        tracing::warn!(path = %path.display(), "directory fsync failed: {}", e);
    }
}

/// Fsync the directory containing `path` so renames and unlinks are durable.
#[cfg(unix)]
pub async fn sync_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => tokio::fs::File::open(parent).await?.sync_all().await,
        None => Ok(()),
    }
}

/// Directories cannot be opened for fsync on non-Unix targets.
#[cfg(not(unix))]
pub async fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
