//! Backup run orchestration.
//!
//! One run is strictly sequential: connect, mirror the remote tree into a
//! fresh staging directory, archive it, prune old archives, disconnect. The
//! staging directory and the remote session are released on every exit
//! path, and errors raised while releasing them are logged, never returned.

use crate::archive::{self, ArchiveSummary};
use crate::config::Config;
use crate::fs::IgnoreList;
use crate::remote::sftp::SftpConnector;
use crate::remote::walker::{self, WalkStats};
use crate::remote::{Connector, RemoteFs};
use crate::retention::{self, archive_file_name};
use crate::utils::format::{format_bytes, format_duration};
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

/// Prefix of the per-run staging directory.
pub const STAGING_PREFIX: &str = "sftp_backup_";

/// What a successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub run_id: Uuid,
    pub archive_path: PathBuf,
    pub files_downloaded: usize,
    pub directories_created: usize,
    pub bytes_downloaded: u64,
    pub entries_ignored: usize,
    pub archive_members: usize,
    pub archive_bytes: u64,
    pub pruned: Vec<PathBuf>,
    pub duration_secs: u64,
}

impl BackupReport {
    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} files ({}) archived into {} bytes, {} ignored, {} old backup(s) pruned in {}",
            self.archive_path.display(),
            self.files_downloaded,
            format_bytes(self.bytes_downloaded),
            self.archive_bytes,
            self.entries_ignored,
            self.pruned.len(),
            format_duration(self.duration_secs)
        )
    }
}

/// Runs backups described by a [`Config`] through a [`Connector`].
pub struct BackupRunner<C: Connector = SftpConnector> {
    config: Config,
    connector: C,
}

impl BackupRunner<SftpConnector> {
    /// Runner that talks to a real SFTP server.
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, SftpConnector)
    }
}

impl<C: Connector> BackupRunner<C> {
    pub fn with_connector(config: Config, connector: C) -> Self {
        Self { config, connector }
    }

    /// Path of the archive a run on `date` produces.
    pub fn archive_path_for(&self, date: NaiveDate) -> PathBuf {
        self.config.backup.backup_dir.join(archive_file_name(date))
    }

    /// Perform one backup dated today (local time).
    pub fn run(&self) -> Result<BackupReport> {
        self.run_for_date(chrono::Local::now().date_naive())
    }

    /// Perform one backup whose archive is named after `date`.
    pub fn run_for_date(&self, date: NaiveDate) -> Result<BackupReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("backup", run_id = %run_id);
        let _guard = span.enter();

        let result = self.execute(run_id, date);
        if let Err(e) = &result {
            error!(error = %e, "Backup failed");
        }
        result
    }

    fn execute(&self, run_id: Uuid, date: NaiveDate) -> Result<BackupReport> {
        let start = Instant::now();
        let backup = &self.config.backup;

        std::fs::create_dir_all(&backup.backup_dir)?;
        let archive_path = self.archive_path_for(date);

        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        let staging = match &backup.staging_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let staging_path = staging.path().to_path_buf();

        let outcome = self.execute_staged(&staging_path, &archive_path);

        if let Err(e) = staging.close() {
            warn!(path = %staging_path.display(), error = %e, "Failed to remove staging directory");
        }

        let (walk, summary, pruned) = outcome?;
        let report = BackupReport {
            run_id,
            archive_path,
            files_downloaded: walk.files,
            directories_created: walk.directories,
            bytes_downloaded: walk.bytes,
            entries_ignored: walk.ignored,
            archive_members: summary.members,
            archive_bytes: summary.bytes,
            pruned,
            duration_secs: start.elapsed().as_secs(),
        };
        info!("Backup complete: {}", report.summary());
        Ok(report)
    }

    fn execute_staged(
        &self,
        staging: &Path,
        archive_path: &Path,
    ) -> Result<(WalkStats, ArchiveSummary, Vec<PathBuf>)> {
        let ignore = IgnoreList::load(&self.config.backup.ignore_file)?;
        if ignore.is_empty() {
            info!("No ignore patterns configured");
        } else {
            info!("Loaded {} ignore patterns", ignore.len());
        }

        let session = self.connector.connect(&self.config.remote)?;
        let outcome = self.transfer(&session, &ignore, staging, archive_path);

        if let Err(e) = session.close() {
            warn!(error = %e, "Failed to close remote session");
        }

        outcome
    }

    fn transfer(
        &self,
        session: &C::Session,
        ignore: &IgnoreList,
        staging: &Path,
        archive_path: &Path,
    ) -> Result<(WalkStats, ArchiveSummary, Vec<PathBuf>)> {
        let root = &self.config.remote.root;
        let walk = walker::walk(session, root, staging, ignore)?;
        info!(
            "Download complete: {} files, {} directories, {}; creating zip...",
            walk.files,
            walk.directories,
            format_bytes(walk.bytes)
        );

        let summary = archive::archive(staging, archive_path)?;
        let pruned = retention::prune(&self.config.backup.backup_dir, self.config.backup.keep_num_backups)?;

        Ok((walk, summary, pruned))
    }
}
