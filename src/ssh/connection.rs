use super::remote_fs::SftpBackend;
use super::sftp::SftpClient;
use crate::config::{ConnectionSettings, TransferSettings};
use crate::error::{Error, Result};
use russh::client::{self, Config, Handle};
use russh::keys::key::PublicKey;
use russh::Disconnect;
use russh_sftp::client::SftpSession;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub enum AuthMethod {
    Password(String),
    PublicKey {
        key_path: PathBuf,
        passphrase: Option<String>,
    },
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(***)"),
            AuthMethod::PublicKey { key_path, .. } => f
                .debug_struct("PublicKey")
                .field("key_path", key_path)
                .finish_non_exhaustive(),
        }
    }
}

/// Everything needed to open an SFTP session
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    pub strict_host_key_checking: bool,
    /// known_hosts file used for strict checking, `~/.ssh/known_hosts` when unset
    pub known_hosts_path: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub inactivity_timeout: Option<Duration>,
}

impl ConnectConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        auth: AuthMethod,
    ) -> Self {
        let defaults = ConnectionSettings::default();
        Self {
            host: host.into(),
            port,
            username: username.into(),
            auth,
            strict_host_key_checking: defaults.strict_host_key_checking,
            known_hosts_path: None,
            connect_timeout: Duration::from_secs(defaults.connect_timeout_secs),
            inactivity_timeout: None,
        }
    }

    pub fn from_settings(settings: &ConnectionSettings, secret: Option<String>) -> Result<Self> {
        Ok(Self {
            host: settings.host.clone(),
            port: settings.port,
            username: settings.username.clone(),
            auth: settings.auth_method(secret)?,
            strict_host_key_checking: settings.strict_host_key_checking,
            known_hosts_path: settings
                .known_hosts_path
                .as_deref()
                .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref())),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            inactivity_timeout: settings.inactivity_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// SSH client handler for russh
pub(crate) struct ClientHandler {
    host: String,
    port: u16,
    strict_host_key_checking: bool,
    known_hosts_path: Option<PathBuf>,
}

impl ClientHandler {
    fn accepts(&self, server_public_key: &PublicKey) -> bool {
        if !self.strict_host_key_checking {
            log::warn!(
                "Host key verification disabled, accepting key for {}:{}",
                self.host,
                self.port
            );
            return true;
        }

        let result = match &self.known_hosts_path {
            Some(path) => russh_keys::check_known_hosts_path(
                &self.host,
                self.port,
                server_public_key,
                path,
            ),
            None => russh_keys::check_known_hosts(&self.host, self.port, server_public_key),
        };

        match result {
            Ok(true) => true,
            Ok(false) => {
                log::error!("Host {}:{} is not in known_hosts", self.host, self.port);
                false
            }
            Err(e) => {
                log::error!("Host key check for {}:{} failed: {}", self.host, self.port, e);
                false
            }
        }
    }
}

#[async_trait::async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(self.accepts(server_public_key))
    }
}

/// Whether the private key at `key_path` needs a passphrase to load
pub fn key_is_encrypted(key_path: &Path) -> bool {
    matches!(
        russh_keys::load_secret_key(key_path, None),
        Err(russh_keys::Error::KeyIsEncrypted)
    )
}

impl SftpClient {
    /// Connect, authenticate and start the `sftp` subsystem
    pub async fn connect(config: &ConnectConfig, transfer: TransferSettings) -> Result<Self> {
        log::info!(
            "Connecting to {}@{}:{}",
            config.username,
            config.host,
            config.port
        );

        match establish(config).await {
            Ok((handle, sftp)) => {
                log::debug!("Connection to {} established", config.addr());
                Ok(SftpClient::from_parts(
                    Box::new(SftpBackend::new(sftp)),
                    Some(handle),
                    config.host.clone(),
                    transfer,
                ))
            }
            Err(e) => {
                log::error!(
                    "Connection failed [{}, {}]: {}",
                    config.host,
                    config.port,
                    e
                );
                Err(e)
            }
        }
    }

    /// Close the SFTP session and the SSH transport.
    ///
    /// Failures are logged, not returned; disconnecting a closed session does
    /// nothing.
    pub async fn disconnect(mut self) {
        let handle = self.handle.take();
        if let Some(handle) = &handle {
            if handle.is_closed() {
                log::debug!("Session to {} already closed", self.host);
                return;
            }
        }

        if let Err(e) = self.fs.close().await {
            log::error!("Failed to close SFTP session to {}: {}", self.host, e);
        }

        if let Some(handle) = handle {
            if let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
            {
                log::error!("Failed to disconnect from {}: {}", self.host, e);
                return;
            }
        }
        log::debug!("Disconnected from {}", self.host);
    }

    /// Whether the SSH transport is still open. Clients built over a
    /// custom backend have no transport and always report true.
    pub fn is_connected(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_closed())
            .unwrap_or(true)
    }
}

async fn establish(config: &ConnectConfig) -> Result<(Handle<ClientHandler>, SftpSession)> {
    let addr = config.addr();
    let ssh_config = Arc::new(Config {
        inactivity_timeout: config.inactivity_timeout,
        ..Default::default()
    });
    let handler = ClientHandler {
        host: config.host.clone(),
        port: config.port,
        strict_host_key_checking: config.strict_host_key_checking,
        known_hosts_path: config.known_hosts_path.clone(),
    };

    let mut session = match tokio::time::timeout(
        config.connect_timeout,
        client::connect(ssh_config, addr.as_str(), handler),
    )
    .await
    {
        Ok(Ok(session)) => session,
        Ok(Err(russh::Error::UnknownKey)) => return Err(Error::HostKey(config.host.clone())),
        Ok(Err(e)) => return Err(Error::Connect { addr, source: e }),
        Err(_) => return Err(Error::Timeout(addr)),
    };

    let authenticated = match &config.auth {
        AuthMethod::Password(password) => {
            session
                .authenticate_password(config.username.as_str(), password.as_str())
                .await?
        }
        AuthMethod::PublicKey {
            key_path,
            passphrase,
        } => {
            let key = russh_keys::load_secret_key(key_path, passphrase.as_deref())?;
            session
                .authenticate_publickey(config.username.as_str(), Arc::new(key))
                .await?
        }
    };

    if !authenticated {
        return Err(Error::Auth(config.username.clone()));
    }

    let channel = session.channel_open_session().await?;
    channel.request_subsystem(true, "sftp").await?;
    let sftp = SftpSession::new(channel.into_stream()).await?;

    Ok((session, sftp))
}
