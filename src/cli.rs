use clap::{Parser, Subcommand};
use sftpkit::{AuthType, Settings};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sftpkit", version, about = "Run a single SFTP operation against a remote server")]
pub struct Cli {
    /// Config file (defaults to <config dir>/sftpkit/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    #[arg(short = 'P', long, global = true)]
    pub port: Option<u16>,

    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Private key; switches to key authentication
    #[arg(short = 'i', long, global = true)]
    pub key: Option<String>,

    /// Reject servers missing from known_hosts
    #[arg(long, global = true)]
    pub strict_host_key_checking: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the login directory
    Home,
    /// Exit 0 if the remote directory exists
    Exists { dir: String },
    /// Create a remote directory and its parents
    Mkdir { dir: String },
    /// Upload a local file into a remote directory
    Put {
        remote_dir: String,
        local_file: PathBuf,
    },
    /// Download a remote file
    Get {
        remote_dir: String,
        name: String,
        local_path: PathBuf,
    },
    /// List a remote directory
    Ls {
        dir: String,
        /// Only names containing this fragment
        #[arg(long, default_value = "")]
        ext: String,
        #[arg(short, long)]
        long: bool,
    },
    /// Delete a remote file
    Rm { dir: String, name: String },
    /// Delete several remote files by full path
    RmMany {
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

impl Cli {
    /// Command line options win over the config file
    pub fn apply(&self, settings: &mut Settings) {
        let conn = &mut settings.connection;
        if let Some(host) = &self.host {
            conn.host = host.clone();
        }
        if let Some(port) = self.port {
            conn.port = port;
        }
        if let Some(user) = &self.user {
            conn.username = user.clone();
        }
        if let Some(key) = &self.key {
            conn.auth_type = AuthType::Key;
            conn.key_path = Some(key.clone());
        }
        if self.strict_host_key_checking {
            conn.strict_host_key_checking = true;
        }
    }
}
