use std::path::PathBuf;

/// Errors returned by SFTP client operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: russh::Error,
    },

    #[error("connection to {0} timed out")]
    Timeout(String),

    #[error("authentication failed for user {0}")]
    Auth(String),

    #[error("host key for {0} was rejected")]
    HostKey(String),

    #[error("failed to load private key: {0}")]
    Key(#[from] russh_keys::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("SFTP error: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),

    #[error("no such remote path: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("local path has no file name: {0}")]
    InvalidPath(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
