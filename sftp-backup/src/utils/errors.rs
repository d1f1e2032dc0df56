//! Custom error types for the backup tool.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connecting, handshaking or authenticating with the SFTP server failed.
    /// Raised before any file is touched.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transfer error at {path}: {source}")]
    Transfer {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive {}: {source}", path.display())]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to delete {} old backup(s): {}", failed.len(), describe_failures(failed))]
    RetentionDelete { failed: Vec<(PathBuf, std::io::Error)> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    /// True for failures raised while establishing the remote session.
    pub fn is_connection(&self) -> bool {
        matches!(self, BackupError::Connection(_))
    }
}

fn describe_failures(failed: &[(PathBuf, std::io::Error)]) -> String {
    failed
        .iter()
        .map(|(path, e)| format!("{} ({})", path.display(), e))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, BackupError>;
