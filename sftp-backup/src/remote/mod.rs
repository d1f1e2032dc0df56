//! Remote filesystem access.
//!
//! The walker and orchestrator only see the [`RemoteFs`] and [`Connector`]
//! traits. The production implementation lives in [`sftp`].

pub mod sftp;
pub mod walker;

#[cfg(test)]
pub(crate) mod fake;

use crate::config::RemoteConfig;
use crate::Result;
use std::path::Path;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

/// Entry type decided once from the remote mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, devices, sockets, or an entry whose mode was not reported.
    Other,
}

impl EntryKind {
    pub fn from_mode(mode: Option<u32>) -> Self {
        match mode.map(|m| m & S_IFMT) {
            Some(S_IFDIR) => EntryKind::Directory,
            Some(S_IFREG) => EntryKind::File,
            _ => EntryKind::Other,
        }
    }
}

/// One record of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub filename: String,
    pub mode: Option<u32>,
}

impl RemoteEntry {
    pub fn new(filename: impl Into<String>, mode: Option<u32>) -> Self {
        Self {
            filename: filename.into(),
            mode,
        }
    }

    pub fn kind(&self) -> EntryKind {
        EntryKind::from_mode(self.mode)
    }
}

/// An open remote session.
pub trait RemoteFs {
    /// List the entries of `dir`, excluding `.` and `..`.
    fn list_dir(&self, dir: &str) -> std::io::Result<Vec<RemoteEntry>>;

    /// Copy the remote file at `remote` to `local`, returning the byte count.
    fn download(&self, remote: &str, local: &Path) -> std::io::Result<u64>;

    /// Close the session.
    fn close(self) -> std::io::Result<()>
    where
        Self: Sized;
}

/// Opens [`RemoteFs`] sessions.
pub trait Connector {
    type Session: RemoteFs;

    /// Connect and authenticate. Failures are [`crate::BackupError::Connection`].
    fn connect(&self, remote: &RemoteConfig) -> Result<Self::Session>;
}

/// Join a remote directory and an entry name with a single `/`.
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}
