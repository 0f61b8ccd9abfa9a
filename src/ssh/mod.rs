mod connection;
pub mod path;
mod remote_fs;
mod sftp;

#[cfg(test)]
mod memory;

pub use connection::{key_is_encrypted, AuthMethod, ConnectConfig};
pub use remote_fs::{RemoteEntry, RemoteFs, RemoteMetadata, RemoteReader, RemoteWriter, SftpBackend};
pub use sftp::{FileEntry, SftpClient};
