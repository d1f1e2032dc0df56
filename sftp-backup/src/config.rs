//! Configuration management for the backup tool.
//!
//! Loaded either from the environment (with `.env` support) or from a TOML
//! file, then overridden by command-line flags and validated before a run.

use crate::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub remote: RemoteConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// SFTP server host name or address
    pub host: String,

    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Remote directory to back up
    #[serde(default = "default_remote_dir")]
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory holding the dated archives
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Number of archives to keep after each run
    #[serde(default = "default_keep_num_backups")]
    pub keep_num_backups: usize,

    /// File with one ignore glob per line
    #[serde(default = "default_ignore_file")]
    pub ignore_file: PathBuf,

    /// Parent of the per-run staging directory (system temp dir if unset)
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Cron expression (seconds first) for resident mode
    #[serde(default)]
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_port() -> u16 {
    22
}

fn default_remote_dir() -> String {
    "/".to_string()
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_keep_num_backups() -> usize {
    3
}

fn default_ignore_file() -> PathBuf {
    PathBuf::from("ignore_list.txt")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            keep_num_backups: default_keep_num_backups(),
            ignore_file: default_ignore_file(),
            staging_dir: None,
            schedule: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("root", &self.root)
            .finish()
    }
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| BackupError::Config(format!("{} has an invalid value: {:?}", key, raw))),
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| BackupError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load configuration from the process environment, reading `.env` first
    /// if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from `lookup`, which maps variable names to values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Ok(Self {
            remote: RemoteConfig {
                host: var("SFTP_HOST").unwrap_or_default(),
                port: parse_var("SFTP_PORT", var("SFTP_PORT"), default_port())?,
                username: var("SFTP_USER").unwrap_or_default(),
                password: lookup("SFTP_PASSWORD").unwrap_or_default(),
                root: var("REMOTE_DIR").unwrap_or_else(default_remote_dir),
            },
            backup: BackupConfig {
                backup_dir: var("BACKUP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_backup_dir),
                keep_num_backups: parse_var(
                    "KEEP_NUM_BACKUPS",
                    var("KEEP_NUM_BACKUPS"),
                    default_keep_num_backups(),
                )?,
                ignore_file: var("IGNORE_CONFIG_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_ignore_file),
                staging_dir: var("STAGING_DIR").map(PathBuf::from),
                schedule: var("BACKUP_SCHEDULE"),
            },
            log: LogConfig {
                level: var("LOG_LEVEL").unwrap_or_else(default_log_level),
            },
        })
    }

    /// Check the values a run depends on.
    pub fn validate(&self) -> Result<()> {
        if self.remote.host.trim().is_empty() {
            return Err(BackupError::Config("SFTP host is not set".into()));
        }
        if self.remote.username.trim().is_empty() {
            return Err(BackupError::Config("SFTP username is not set".into()));
        }
        if self.remote.port == 0 {
            return Err(BackupError::Config("SFTP port must be non-zero".into()));
        }
        if self.remote.root.is_empty() {
            return Err(BackupError::Config("remote directory must not be empty".into()));
        }
        if self.backup.keep_num_backups == 0 {
            return Err(BackupError::Config(
                "KEEP_NUM_BACKUPS must be at least 1, otherwise the new archive would be pruned"
                    .into(),
            ));
        }
        if let Some(schedule) = &self.backup.schedule {
            if schedule.trim().is_empty() {
                return Err(BackupError::Config("schedule must not be blank".into()));
            }
        }
        Ok(())
    }
}
