//! fsync helpers for publishing bundles

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};

/// Flush every file under `dir`, then the directories themselves
///
/// Data must be on disk before the rename that makes it visible.
pub(crate) async fn sync_tree(dir: &Path) -> io::Result<()> {
    let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];
    let mut dirs = Vec::new();

    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                File::open(entry.path()).await?.sync_all().await?;
            }
        }
        dirs.push(current);
    }

    // Children before parents
    for dir in dirs.iter().rev() {
        sync_dir(dir).await?;
    }
    Ok(())
}

/// Flush a directory's entries (the names in it, not file contents)
#[cfg(unix)]
pub(crate) async fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
pub(crate) async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
