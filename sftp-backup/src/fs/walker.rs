//! Staging-tree traversal.
//!
//! Enumerates the regular files of a local directory in a stable order so
//! the archive built from it is reproducible for a given snapshot.

use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// A regular file discovered under the walk root
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Path relative to the root
    pub relative_path: PathBuf,

    /// File size in bytes
    pub size: u64,
}

impl FileInfo {
    fn from_entry(entry: &DirEntry, root: &Path) -> std::io::Result<Self> {
        let metadata = entry.metadata()?;
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        Ok(Self {
            path,
            relative_path,
            size: metadata.len(),
        })
    }

    /// Relative path joined with `/`, regardless of the host separator.
    pub fn archive_name(&self) -> String {
        self.relative_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Walk `root` and call `callback` for every regular file, in file-name order
/// at each directory level. Symlinks are not followed and directories are
/// never reported.
pub fn walk_files<F>(root: &Path, mut callback: F) -> std::io::Result<()>
where
    F: FnMut(&FileInfo) -> std::io::Result<()>,
{
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;

        if !entry.file_type().is_file() {
            continue;
        }

        let file_info = FileInfo::from_entry(&entry, root)?;
        callback(&file_info)?;
    }

    Ok(())
}

/// Collect every regular file under `root`.
pub fn walk_directory(root: &Path) -> std::io::Result<Vec<FileInfo>> {
    let mut files = Vec::new();
    walk_files(root, |file| {
        files.push(file.clone());
        Ok(())
    })?;
    Ok(files)
}
