//! Packs a staging tree into a deflate-compressed zip archive.
//!
//! The archive is written next to its final location as `<name>.partial`
//! and renamed into place only once every member has been written, so an
//! existing archive of the same name is either fully replaced or untouched.

use crate::fs::walker::walk_directory;
use crate::utils::format::format_bytes;
use crate::{BackupError, Result};
use serde::Serialize;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::result::{ZipError, ZipResult};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const PARTIAL_SUFFIX: &str = ".partial";

/// Outcome of a successful [`archive`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    /// Number of files stored
    pub members: usize,

    /// Size of the finished archive on disk
    pub bytes: u64,
}

/// Path the archive is written to before being renamed over `archive_path`.
pub fn partial_path(archive_path: &Path) -> PathBuf {
    let mut name: OsString = archive_path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Archive every regular file under `source_dir` into `archive_path`.
///
/// Member names are paths relative to `source_dir` joined with `/`, in
/// file-name order. Empty directories are not stored.
pub fn archive(source_dir: &Path, archive_path: &Path) -> Result<ArchiveSummary> {
    let partial = partial_path(archive_path);

    let members = match write_archive(source_dir, &partial) {
        Ok(members) => members,
        Err(source) => {
            if let Err(e) = std::fs::remove_file(&partial) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %partial.display(), error = %e, "Failed to remove partial archive");
                }
            }
            return Err(BackupError::ArchiveWrite {
                path: archive_path.to_path_buf(),
                source,
            });
        }
    };

    std::fs::rename(&partial, archive_path).map_err(|e| BackupError::ArchiveWrite {
        path: archive_path.to_path_buf(),
        source: ZipError::Io(e),
    })?;

    let bytes = std::fs::metadata(archive_path)?.len();
    info!(
        "Backup created: {} ({} files, {})",
        archive_path.display(),
        members,
        format_bytes(bytes)
    );

    Ok(ArchiveSummary { members, bytes })
}

fn write_archive(source_dir: &Path, dest: &Path) -> ZipResult<usize> {
    let files = walk_directory(source_dir)?;
    debug!("Archiving {} staged files into {}", files.len(), dest.display());

    let file = File::create(dest)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));

    for file in &files {
        let member_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(file.size >= u64::from(u32::MAX));
        writer.start_file(file.archive_name(), member_options)?;

        let mut source = File::open(&file.path)?;
        std::io::copy(&mut source, &mut writer)?;
    }

    let mut inner = writer.finish()?;
    inner.flush()?;
    inner.get_ref().sync_all()?;

    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn read_members(path: &Path) -> BTreeMap<String, Vec<u8>> {
        let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut members = BTreeMap::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).unwrap();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            members.insert(entry.name().to_string(), contents);
        }
        members
    }

    #[test]
    fn test_archive_members_and_contents() -> Result<()> {
        let staging = TempDir::new()?;
        let out = TempDir::new()?;
        fs::create_dir(staging.path().join("sub"))?;
        fs::write(staging.path().join("a.txt"), b"alpha")?;
        fs::write(staging.path().join("sub/d.txt"), b"delta delta delta")?;
        let archive_path = out.path().join("backup-2024-05-01.zip");

        let summary = archive(staging.path(), &archive_path)?;

        assert_eq!(summary.members, 2);
        assert_eq!(summary.bytes, fs::metadata(&archive_path)?.len());

        let members = read_members(&archive_path);
        let names: Vec<&str> = members.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a.txt", "sub/d.txt"]);
        assert_eq!(members["a.txt"], b"alpha");
        assert_eq!(members["sub/d.txt"], b"delta delta delta");
        Ok(())
    }

    #[test]
    fn test_members_are_deflated() -> Result<()> {
        let staging = TempDir::new()?;
        let out = TempDir::new()?;
        fs::write(staging.path().join("big.txt"), "x".repeat(64 * 1024))?;
        let archive_path = out.path().join("backup.zip");

        archive(staging.path(), &archive_path)?;

        let mut zip = ZipArchive::new(File::open(&archive_path)?).unwrap();
        let entry = zip.by_name("big.txt").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        assert!(entry.compressed_size() < entry.size());
        Ok(())
    }

    #[test]
    fn test_existing_archive_is_overwritten() -> Result<()> {
        let staging = TempDir::new()?;
        let out = TempDir::new()?;
        let archive_path = out.path().join("backup-2024-05-01.zip");
        fs::write(&archive_path, b"stale bytes, not a zip")?;
        fs::write(staging.path().join("fresh.txt"), b"fresh")?;

        archive(staging.path(), &archive_path)?;

        let members = read_members(&archive_path);
        assert_eq!(members.len(), 1);
        assert_eq!(members["fresh.txt"], b"fresh");
        assert!(!partial_path(&archive_path).exists());
        Ok(())
    }

    #[test]
    fn test_empty_staging_produces_empty_archive() -> Result<()> {
        let staging = TempDir::new()?;
        let out = TempDir::new()?;
        fs::create_dir(staging.path().join("only-dirs"))?;
        let archive_path = out.path().join("backup.zip");

        let summary = archive(staging.path(), &archive_path)?;

        assert_eq!(summary.members, 0);
        assert!(read_members(&archive_path).is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_write_leaves_previous_archive() -> Result<()> {
        let out = TempDir::new()?;
        let archive_path = out.path().join("backup.zip");
        fs::write(&archive_path, b"previous")?;

        let err = archive(&out.path().join("missing-staging"), &archive_path).unwrap_err();

        assert!(matches!(err, BackupError::ArchiveWrite { .. }));
        assert_eq!(fs::read(&archive_path)?, b"previous");
        assert!(!partial_path(&archive_path).exists());
        Ok(())
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("backups/backup-2024-05-01.zip")),
            PathBuf::from("backups/backup-2024-05-01.zip.partial")
        );
    }
}
