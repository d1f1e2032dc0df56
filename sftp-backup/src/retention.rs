//! Retention of dated backup archives.

use crate::{BackupError, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{error, info};

const ARCHIVE_PREFIX: &str = "backup-";
const ARCHIVE_SUFFIX: &str = ".zip";

/// File name of the archive for `date`, e.g. `backup-2024-05-01.zip`.
pub fn archive_file_name(date: NaiveDate) -> String {
    format!("{}{}{}", ARCHIVE_PREFIX, date.format("%Y-%m-%d"), ARCHIVE_SUFFIX)
}

/// True if `name` looks like `backup-*.zip`.
pub fn is_archive_name(name: &str) -> bool {
    name.len() >= ARCHIVE_PREFIX.len() + ARCHIVE_SUFFIX.len()
        && name.starts_with(ARCHIVE_PREFIX)
        && name.ends_with(ARCHIVE_SUFFIX)
}

/// An archive found in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// List the archives in `backup_dir`, oldest first.
///
/// Ties on modification time are ordered by file name.
pub fn list_archives(backup_dir: &Path) -> std::io::Result<Vec<ArchiveFile>> {
    let mut archives = Vec::new();

    for entry in std::fs::read_dir(backup_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !is_archive_name(&name.to_string_lossy()) {
            continue;
        }

        // Follow symlinks so a linked archive is judged by its target.
        let metadata = match std::fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if !metadata.is_file() {
            continue;
        }

        archives.push(ArchiveFile {
            path: entry.path(),
            modified: metadata.modified()?,
        });
    }

    archives.sort_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
    });

    Ok(archives)
}

/// Delete all but the `keep` most recently modified archives in `backup_dir`.
///
/// Every eligible archive is attempted; failures are collected and reported
/// together once the loop has finished. Returns the deleted paths.
pub fn prune(backup_dir: &Path, keep: usize) -> Result<Vec<PathBuf>> {
    prune_with(backup_dir, keep, |path| std::fs::remove_file(path))
}

/// Like [`prune`], with `remove` deleting each excess archive.
pub fn prune_with<F>(backup_dir: &Path, keep: usize, mut remove: F) -> Result<Vec<PathBuf>>
where
    F: FnMut(&Path) -> std::io::Result<()>,
{
    let archives = list_archives(backup_dir)?;

    if archives.len() <= keep {
        return Ok(Vec::new());
    }

    let excess = archives.len() - keep;
    let mut deleted = Vec::with_capacity(excess);
    let mut failed = Vec::new();

    for archive in archives.into_iter().take(excess) {
        let name = archive
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match remove(&archive.path) {
            Ok(()) => {
                info!("Deleted old backup: {}", name);
                deleted.push(archive.path);
            }
            Err(e) => {
                error!(archive = %name, error = %e, "Failed to delete old backup");
                failed.push((archive.path, e));
            }
        }
    }

    if failed.is_empty() {
        Ok(deleted)
    } else {
        Err(BackupError::RetentionDelete { failed })
    }
}
