//! In-memory remote tree for tests.

use super::{join_remote, Connector, RemoteEntry, RemoteFs};
use crate::config::RemoteConfig;
use crate::{BackupError, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const DIR_MODE: u32 = 0o040755;
const FILE_MODE: u32 = 0o100644;

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryRemote {
    dirs: BTreeMap<String, Vec<RemoteEntry>>,
    files: BTreeMap<String, Vec<u8>>,
    broken: HashSet<String>,
    close_fails: bool,
    closed: Arc<AtomicBool>,
    lists: Arc<AtomicUsize>,
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

impl MemoryRemote {
    /// Empty tree with only `/`.
    pub(crate) fn new() -> Self {
        let mut remote = Self::default();
        remote.dirs.insert("/".to_string(), Vec::new());
        remote
    }

    fn add_entry(&mut self, path: &str, mode: Option<u32>) {
        let parent = parent_of(path);
        if !self.dirs.contains_key(&parent) {
            self.add_dir(&parent);
        }
        if let Some(entries) = self.dirs.get_mut(&parent) {
            entries.push(RemoteEntry::new(name_of(path), mode));
        }
    }

    fn add_dir(&mut self, path: &str) {
        if self.dirs.contains_key(path) {
            return;
        }
        self.dirs.insert(path.to_string(), Vec::new());
        if path != "/" {
            self.add_entry(path, Some(DIR_MODE));
        }
    }

    pub(crate) fn dir(mut self, path: &str) -> Self {
        self.add_dir(path);
        self
    }

    pub(crate) fn file(self, path: &str, contents: &[u8]) -> Self {
        self.entry(path, Some(FILE_MODE), contents)
    }

    /// A downloadable entry with an arbitrary (or missing) mode.
    pub(crate) fn entry(mut self, path: &str, mode: Option<u32>, contents: &[u8]) -> Self {
        self.add_entry(path, mode);
        self.files.insert(path.to_string(), contents.to_vec());
        self
    }

    /// Listing or downloading `path` fails.
    pub(crate) fn broken(mut self, path: &str) -> Self {
        self.broken.insert(path.to_string());
        self
    }

    /// Closing the session reports an error (after marking it closed).
    pub(crate) fn failing_close(mut self) -> Self {
        self.close_fails = true;
        self
    }

    pub(crate) fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    fn check(&self, path: &str) -> std::io::Result<()> {
        if self.broken.contains(path) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("simulated failure on {}", path),
            ));
        }
        Ok(())
    }
}

impl RemoteFs for MemoryRemote {
    fn list_dir(&self, dir: &str) -> std::io::Result<Vec<RemoteEntry>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.check(dir)?;
        self.dirs.get(dir).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("no such directory: {}", dir))
        })
    }

    fn download(&self, remote: &str, local: &Path) -> std::io::Result<u64> {
        self.check(remote)?;
        let contents = self.files.get(remote).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("no such file: {}", remote))
        })?;
        std::fs::write(local, contents)?;
        Ok(contents.len() as u64)
    }

    fn close(self) -> std::io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.close_fails {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated disconnect failure",
            ));
        }
        Ok(())
    }
}

/// Hands out clones of one [`MemoryRemote`], or refuses to connect.
#[derive(Debug, Clone)]
pub(crate) struct MemoryConnector {
    remote: Option<MemoryRemote>,
}

impl MemoryConnector {
    pub(crate) fn new(remote: MemoryRemote) -> Self {
        Self { remote: Some(remote) }
    }

    pub(crate) fn refusing() -> Self {
        Self { remote: None }
    }
}

impl Connector for MemoryConnector {
    type Session = MemoryRemote;

    fn connect(&self, _remote: &RemoteConfig) -> Result<MemoryRemote> {
        self.remote
            .clone()
            .ok_or_else(|| BackupError::Connection("authentication rejected".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_tree_layout() -> std::io::Result<()> {
        let remote = MemoryRemote::new()
            .file("/a.txt", b"a")
            .file("/sub/d.txt", b"d");

        let root = remote.list_dir("/")?;
        assert_eq!(root.len(), 2);
        assert!(root.iter().any(|e| e.filename == "sub" && e.mode == Some(DIR_MODE)));
        assert_eq!(remote.list_dir(&join_remote("/", "sub"))?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_failing_close_still_marks_closed() {
        let remote = MemoryRemote::new().failing_close();
        let closed = remote.closed_flag();

        assert!(remote.close().is_err());
        assert!(closed.load(Ordering::SeqCst));
    }
}
