//! Thin SFTP client utility over `russh` and `russh-sftp`.
//!
//! [`SftpClient`] opens one SSH session with the `sftp` subsystem and
//! exposes one method per file operation: home directory lookup, directory
//! probing and recursive creation, upload, download, listing and deletion.

pub mod config;
pub mod error;
pub mod ssh;

pub use config::{AuthType, ConnectionSettings, Settings, TransferSettings};
pub use error::{Error, Result};
pub use ssh::{AuthMethod, ConnectConfig, FileEntry, SftpClient};
