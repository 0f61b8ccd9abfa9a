use super::connection::ClientHandler;
use super::path;
use super::remote_fs::RemoteFs;
use crate::config::TransferSettings;
use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use russh::client::Handle;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// SFTP file entry information
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    pub permissions: Option<u32>,
    pub modified: Option<DateTime<Utc>>,
}

/// SFTP client for file operations over SSH
pub struct SftpClient {
    pub(crate) fs: Box<dyn RemoteFs>,
    pub(crate) handle: Option<Handle<ClientHandler>>,
    pub(crate) host: String,
    transfer: TransferSettings,
}

impl SftpClient {
    pub(crate) fn from_parts(
        fs: Box<dyn RemoteFs>,
        handle: Option<Handle<ClientHandler>>,
        host: String,
        transfer: TransferSettings,
    ) -> Self {
        Self {
            fs,
            handle,
            host,
            transfer,
        }
    }

    /// Build a client over any `RemoteFs` backend. `host` is only used in
    /// log messages.
    pub fn with_backend(
        fs: Box<dyn RemoteFs>,
        host: impl Into<String>,
        transfer: TransferSettings,
    ) -> Self {
        Self::from_parts(fs, None, host.into(), transfer)
    }

    /// Absolute path of the login directory
    pub async fn home_dir(&self) -> Result<String> {
        match self.fs.canonicalize(".").await {
            Ok(home) => {
                log::debug!("Home directory on {}: {}", self.host, home);
                Ok(home)
            }
            Err(e) => {
                log::error!("Failed to resolve home directory on {}: {}", self.host, e);
                Err(e)
            }
        }
    }

    /// Check whether `remote_dir` exists and is a directory
    pub async fn exists_dir(&self, remote_dir: &str) -> bool {
        matches!(self.fs.metadata(remote_dir).await, Ok(meta) if meta.is_dir)
    }

    /// Create `remote_dir` together with any missing parents
    pub async fn mkdir(&self, remote_dir: &str) -> Result<()> {
        let result = self.create_dir_all(remote_dir).await;
        if let Err(e) = &result {
            log::error!("mkdir {} on {} failed: {}", remote_dir, self.host, e);
        }
        result
    }

    async fn create_dir_all(&self, remote_dir: &str) -> Result<()> {
        for dir in path::dir_chain(remote_dir) {
            if self.exists_dir(&dir).await {
                continue;
            }

            log::debug!("Creating remote directory {}", dir);
            if let Err(e) = self.fs.create_dir(&dir).await {
                // Somebody else may have created it in the meantime
                if !self.exists_dir(&dir).await {
                    return Err(e);
                }
            }
        }

        if self.exists_dir(remote_dir).await {
            Ok(())
        } else {
            Err(Error::NotADirectory(path::normalize(remote_dir)))
        }
    }

    /// Upload a local file into `remote_dir`, keeping its file name.
    ///
    /// Returns the number of bytes sent.
    pub async fn upload(&self, remote_dir: &str, local_file: impl AsRef<Path>) -> Result<u64> {
        let local_file = local_file.as_ref();
        log::info!(
            "Uploading {} to {}:{}",
            local_file.display(),
            self.host,
            remote_dir
        );

        let result = self.upload_file(remote_dir, local_file).await;
        match &result {
            Ok(sent) => log::debug!("Uploaded {} bytes from {}", sent, local_file.display()),
            Err(e) => log::error!(
                "upload {} -> {} failed: {}",
                local_file.display(),
                remote_dir,
                e
            ),
        }
        result
    }

    async fn upload_file(&self, remote_dir: &str, local_file: &Path) -> Result<u64> {
        let file_name = local_file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidPath(local_file.to_path_buf()))?;

        let mut source = tokio::fs::File::open(local_file).await?;

        if self.transfer.create_remote_dirs {
            self.mkdir(remote_dir).await?;
        }

        let remote_path = path::join(remote_dir, file_name);
        let mut sink = self.fs.create(&remote_path).await?;
        let sent = copy_chunked(&mut source, &mut sink, self.transfer.effective_chunk_size()).await?;
        sink.shutdown().await?;

        Ok(sent)
    }

    /// Download `remote_dir/remote_file_name` to `local_path`.
    ///
    /// The local file is only created once the remote file has been opened,
    /// and is removed again if the transfer fails part way.
    pub async fn download(
        &self,
        remote_dir: &str,
        remote_file_name: &str,
        local_path: impl AsRef<Path>,
    ) -> Result<u64> {
        let local_path = local_path.as_ref();
        let remote_path = path::join(remote_dir, remote_file_name);
        log::info!(
            "Downloading {}:{} to {}",
            self.host,
            remote_path,
            local_path.display()
        );

        let result = self.download_file(&remote_path, local_path).await;
        match &result {
            Ok(received) => log::debug!("Downloaded {} bytes from {}", received, remote_path),
            Err(e) => log::error!(
                "download {} -> {} failed: {}",
                remote_path,
                local_path.display(),
                e
            ),
        }
        result
    }

    async fn download_file(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let mut source = self.fs.open(remote_path).await?;
        let mut sink = tokio::fs::File::create(local_path).await?;

        match copy_chunked(&mut source, &mut sink, self.transfer.effective_chunk_size()).await {
            Ok(received) => Ok(received),
            Err(e) => {
                drop(sink);
                if let Err(rm) = tokio::fs::remove_file(local_path).await {
                    log::warn!(
                        "Could not remove partial download {}: {}",
                        local_path.display(),
                        rm
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Names in `remote_dir`, without `.` and `..`, keeping those that
    /// contain `ext` (everything when `ext` is empty)
    pub async fn file_list(&self, remote_dir: &str, ext: &str) -> Result<Vec<String>> {
        log::debug!("Listing {} on {}", remote_dir, self.host);

        let entries = self.fs.read_dir(remote_dir).await.map_err(|e| {
            log::error!("Listing {} on {} failed: {}", remote_dir, self.host, e);
            e
        })?;

        Ok(entries
            .into_iter()
            .map(|entry| entry.name)
            .filter(|name| name != "." && name != "..")
            .filter(|name| path::matches_ext(name, ext))
            .collect())
    }

    /// Directory contents with metadata, directories first then by name
    pub async fn list_entries(&self, remote_dir: &str) -> Result<Vec<FileEntry>> {
        log::debug!("Listing directory: {}", remote_dir);

        let entries = self.fs.read_dir(remote_dir).await.map_err(|e| {
            log::error!("Listing {} on {} failed: {}", remote_dir, self.host, e);
            e
        })?;

        let mut result: Vec<FileEntry> = entries
            .into_iter()
            .filter(|entry| entry.name != "." && entry.name != "..")
            .map(|entry| FileEntry {
                name: entry.name,
                is_directory: entry.metadata.is_dir,
                size: entry.metadata.size,
                permissions: entry.metadata.permissions,
                modified: entry
                    .metadata
                    .mtime
                    .and_then(|ts| Utc.timestamp_opt(ts as i64, 0).single()),
            })
            .collect();

        result.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(result)
    }

    /// Delete `remote_dir/remote_file_name`
    pub async fn remove_file(&self, remote_dir: &str, remote_file_name: &str) -> Result<()> {
        let remote_path = path::join(remote_dir, remote_file_name);
        log::info!("Deleting file: {}", remote_path);

        self.fs.remove_file(&remote_path).await.map_err(|e| {
            log::error!("Deleting {} on {} failed: {}", remote_path, self.host, e);
            e
        })
    }

    /// Delete every path in `paths`, returning how many were removed.
    ///
    /// A failure is logged and does not stop the remaining deletions.
    pub async fn remove_files<I, S>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = 0;
        for remote_path in paths {
            let remote_path = remote_path.as_ref();
            match self.fs.remove_file(remote_path).await {
                Ok(()) => removed += 1,
                Err(e) => log::error!("Deleting {} on {} failed: {}", remote_path, self.host, e),
            }
        }
        removed
    }
}

async fn copy_chunked<R, W>(reader: &mut R, writer: &mut W, chunk_size: usize) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await?;
        total += n as u64;
    }
    writer.flush().await?;
    Ok(total)
}
