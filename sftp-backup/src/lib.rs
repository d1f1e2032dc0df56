//! SFTP Backup Library
//!
//! Mirrors a remote directory over SFTP, packs it into a dated zip archive
//! and keeps only the most recent archives.

pub mod archive;
pub mod config;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod remote;
pub mod retention;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupReport, BackupRunner};
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
