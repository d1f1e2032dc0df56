//! Mirrors a remote directory tree into a local staging directory.

use super::{join_remote, EntryKind, RemoteFs};
use crate::fs::IgnoreList;
use crate::{BackupError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Counters gathered while mirroring a remote tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
    pub ignored: usize,
}

/// Download everything under `remote_dir` into `local_dir`, skipping entries
/// whose file name is ignored.
///
/// Ignored directories are not descended into. Entries that are not
/// directories, including those with an unknown mode, are fetched as regular
/// files. `local_dir` is created even if the remote directory is empty.
/// The first listing or transfer failure aborts the walk.
pub fn walk<R: RemoteFs>(
    remote: &R,
    remote_dir: &str,
    local_dir: &Path,
    ignore: &IgnoreList,
) -> Result<WalkStats> {
    let mut stats = WalkStats::default();
    let mut pending: Vec<(String, PathBuf)> = vec![(remote_dir.to_string(), local_dir.to_path_buf())];

    while let Some((dir, local)) = pending.pop() {
        std::fs::create_dir_all(&local)?;

        let entries = remote.list_dir(&dir).map_err(|source| BackupError::Transfer {
            path: dir.clone(),
            source,
        })?;

        for entry in entries {
            if entry.filename.is_empty()
                || entry.filename == "."
                || entry.filename == ".."
                || entry.filename.contains('/')
            {
                continue;
            }

            if ignore.is_ignored(&entry.filename) {
                debug!(name = %entry.filename, dir = %dir, "Ignoring");
                stats.ignored += 1;
                continue;
            }

            let remote_path = join_remote(&dir, &entry.filename);
            let local_path = local.join(&entry.filename);
            let kind = entry.kind();
            debug!(path = %remote_path, kind = ?kind, mode = ?entry.mode, "Found");

            match kind {
                EntryKind::Directory => {
                    stats.directories += 1;
                    pending.push((remote_path, local_path));
                }
                EntryKind::File | EntryKind::Other => {
                    let bytes = remote.download(&remote_path, &local_path).map_err(|source| {
                        BackupError::Transfer {
                            path: remote_path.clone(),
                            source,
                        }
                    })?;
                    stats.files += 1;
                    stats.bytes += bytes;
                }
            }
        }
    }

    Ok(stats)
}
