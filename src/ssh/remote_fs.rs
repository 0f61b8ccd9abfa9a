use crate::error::{Error, Result};
use async_trait::async_trait;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::StatusCode;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

pub type RemoteReader = Pin<Box<dyn AsyncRead + Send>>;
pub type RemoteWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Attributes of a remote file as reported by the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub is_dir: bool,
    pub size: u64,
    pub permissions: Option<u32>,
    /// Unix timestamp
    pub mtime: Option<u64>,
}

impl RemoteMetadata {
    /// Without permission bits the entry is treated as a plain file
    pub fn from_raw(size: Option<u64>, permissions: Option<u32>, mtime: Option<u64>) -> Self {
        Self {
            is_dir: permissions.map(|p| p & S_IFMT == S_IFDIR).unwrap_or(false),
            size: size.unwrap_or(0),
            permissions,
            mtime,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub name: String,
    pub metadata: RemoteMetadata,
}

/// The SFTP primitives the client is built from.
///
/// Writers returned by `create` must be shut down to flush and close the
/// remote handle.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    async fn canonicalize(&self, path: &str) -> Result<String>;
    async fn metadata(&self, path: &str) -> Result<RemoteMetadata>;
    /// Raw directory listing, in server order
    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>>;
    async fn create_dir(&self, path: &str) -> Result<()>;
    async fn remove_file(&self, path: &str) -> Result<()>;
    async fn open(&self, path: &str) -> Result<RemoteReader>;
    /// Create or truncate a remote file for writing
    async fn create(&self, path: &str) -> Result<RemoteWriter>;
    async fn close(&self) -> Result<()>;
}

/// `RemoteFs` over a russh-sftp session
pub struct SftpBackend {
    session: SftpSession,
}

impl SftpBackend {
    pub fn new(session: SftpSession) -> Self {
        Self { session }
    }
}

fn map_sftp_error(path: &str, err: SftpError) -> Error {
    match err {
        SftpError::Status(ref status) if matches!(status.status_code, StatusCode::NoSuchFile) => {
            Error::NotFound(path.to_string())
        }
        other => Error::Sftp(other),
    }
}

fn to_metadata(attrs: &russh_sftp::protocol::FileAttributes) -> RemoteMetadata {
    RemoteMetadata::from_raw(attrs.size, attrs.permissions, attrs.mtime.map(u64::from))
}

#[async_trait]
impl RemoteFs for SftpBackend {
    async fn canonicalize(&self, path: &str) -> Result<String> {
        self.session
            .canonicalize(path)
            .await
            .map_err(|e| map_sftp_error(path, e))
    }

    async fn metadata(&self, path: &str) -> Result<RemoteMetadata> {
        let attrs = self
            .session
            .metadata(path)
            .await
            .map_err(|e| map_sftp_error(path, e))?;
        Ok(to_metadata(&attrs))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let dir = self
            .session
            .read_dir(path)
            .await
            .map_err(|e| map_sftp_error(path, e))?;

        Ok(dir
            .map(|entry| RemoteEntry {
                name: entry.file_name(),
                metadata: to_metadata(&entry.metadata()),
            })
            .collect())
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        self.session
            .create_dir(path)
            .await
            .map_err(|e| map_sftp_error(path, e))
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        self.session
            .remove_file(path)
            .await
            .map_err(|e| map_sftp_error(path, e))
    }

    async fn open(&self, path: &str) -> Result<RemoteReader> {
        let file = self
            .session
            .open(path)
            .await
            .map_err(|e| map_sftp_error(path, e))?;
        Ok(Box::pin(file))
    }

    async fn create(&self, path: &str) -> Result<RemoteWriter> {
        let file = self
            .session
            .create(path)
            .await
            .map_err(|e| map_sftp_error(path, e))?;
        Ok(Box::pin(file))
    }

    async fn close(&self) -> Result<()> {
        self.session.close().await?;
        Ok(())
    }
}
