use crate::error::{Error, Result};
use crate::ssh::AuthMethod;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AuthType {
    #[default]
    Password,
    Key,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth_type: AuthType,
    pub key_path: Option<String>,
    /// Only accept servers already listed in the user's known_hosts
    pub strict_host_key_checking: bool,
    pub known_hosts_path: Option<String>,
    pub connect_timeout_secs: u64,
    pub inactivity_timeout_secs: Option<u64>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 22,
            username: String::new(),
            auth_type: AuthType::Password,
            key_path: None,
            strict_host_key_checking: false,
            known_hosts_path: None,
            connect_timeout_secs: 30,
            inactivity_timeout_secs: None,
        }
    }
}

impl ConnectionSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the credential for this connection.
    ///
    /// For password auth `secret` is the password; for key auth it is the
    /// optional key passphrase.
    pub fn auth_method(&self, secret: Option<String>) -> Result<AuthMethod> {
        match self.auth_type {
            AuthType::Password => Ok(AuthMethod::Password(secret.unwrap_or_default())),
            AuthType::Key => {
                let key_path = self.key_path.as_deref().ok_or_else(|| {
                    Error::Config("auth_type is Key but key_path is not set".to_string())
                })?;
                let expanded = shellexpand::tilde(key_path);
                Ok(AuthMethod::PublicKey {
                    key_path: PathBuf::from(expanded.as_ref()),
                    passphrase: secret,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    pub chunk_size: usize,
    /// Create the remote directory before uploading into it
    pub create_remote_dirs: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            create_remote_dirs: false,
        }
    }
}

impl TransferSettings {
    pub fn effective_chunk_size(&self) -> usize {
        if self.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub transfer: TransferSettings,
}

impl Settings {
    /// Load settings from the default config file, falling back to defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            log::debug!("No config at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(settings)
    }

    /// Save settings to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;

        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not find config directory".to_string()))?;

        Ok(config_dir.join("sftpkit").join("config.toml"))
    }
}
