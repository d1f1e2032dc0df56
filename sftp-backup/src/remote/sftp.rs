//! SFTP sessions over libssh2.

use super::{Connector, RemoteEntry, RemoteFs};
use crate::config::RemoteConfig;
use crate::{BackupError, Result};
use std::net::TcpStream;
use std::path::Path;
use tracing::{debug, info};

/// An authenticated SSH session with its SFTP channel.
pub struct SftpSession {
    sftp: ssh2::Sftp,
    session: ssh2::Session,
}

impl SftpSession {
    /// Connect to `remote.host:remote.port` and authenticate with a password.
    pub fn connect(remote: &RemoteConfig) -> Result<Self> {
        let addr = format!("{}:{}", remote.host, remote.port);
        let tcp = TcpStream::connect(&addr)
            .map_err(|e| BackupError::Connection(format!("cannot reach {}: {}", addr, e)))?;

        let mut session = ssh2::Session::new()
            .map_err(|e| BackupError::Connection(format!("cannot create SSH session: {}", e)))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| BackupError::Connection(format!("SSH handshake with {} failed: {}", addr, e)))?;

        session
            .userauth_password(&remote.username, &remote.password)
            .map_err(|e| BackupError::Connection(format!("SSH authentication failed: {}", e)))?;

        if !session.authenticated() {
            return Err(BackupError::Connection(
                "Unable to establish SFTP connection, are the credentials right?".into(),
            ));
        }

        let sftp = session
            .sftp()
            .map_err(|e| BackupError::Connection(format!("cannot open SFTP channel: {}", e)))?;

        info!(host = %remote.host, port = remote.port, user = %remote.username, "Connected to SFTP");
        Ok(Self { sftp, session })
    }
}

impl RemoteFs for SftpSession {
    fn list_dir(&self, dir: &str) -> std::io::Result<Vec<RemoteEntry>> {
        let listing = self.sftp.readdir(Path::new(dir))?;

        Ok(listing
            .into_iter()
            .filter_map(|(path, stat)| {
                let filename = path.file_name()?.to_string_lossy().into_owned();
                Some(RemoteEntry::new(filename, stat.perm))
            })
            .collect())
    }

    fn download(&self, remote: &str, local: &Path) -> std::io::Result<u64> {
        let mut remote_file = self.sftp.open(Path::new(remote))?;
        let mut local_file = std::fs::File::create(local)?;
        let bytes = std::io::copy(&mut remote_file, &mut local_file)?;
        debug!(remote = %remote, bytes, "Downloaded");
        Ok(bytes)
    }

    fn close(self) -> std::io::Result<()> {
        let SftpSession { sftp, session } = self;
        drop(sftp);
        session.disconnect(None, "backup complete", None)?;
        Ok(())
    }
}

/// Connects with [`SftpSession::connect`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SftpConnector;

impl Connector for SftpConnector {
    type Session = SftpSession;

    fn connect(&self, remote: &RemoteConfig) -> Result<SftpSession> {
        SftpSession::connect(remote)
    }
}
