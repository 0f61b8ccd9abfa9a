mod cli;

use clap::Parser;
use cli::{Cli, Command};
use sftpkit::ssh::{key_is_encrypted, path};
use sftpkit::{AuthMethod, ConnectConfig, ConnectionSettings, Settings, SftpClient};
use std::process::ExitCode;

const PASSWORD_ENV: &str = "SFTPKIT_PASSWORD";

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::debug!("Starting sftpkit v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    cli.apply(&mut settings);

    if settings.connection.username.is_empty() {
        anyhow::bail!("no username given; pass --user or set connection.username");
    }

    let secret = read_secret(&settings.connection)?;
    let config = ConnectConfig::from_settings(&settings.connection, secret)?;
    let sftp = SftpClient::connect(&config, settings.transfer.clone()).await?;

    let outcome = execute(&sftp, &cli.command).await;
    sftp.disconnect().await;
    outcome
}

/// Password or key passphrase from the environment, prompting on the
/// terminal when it is not set
fn read_secret(conn: &ConnectionSettings) -> anyhow::Result<Option<String>> {
    if let Ok(secret) = std::env::var(PASSWORD_ENV) {
        return Ok(Some(secret));
    }

    match conn.auth_method(None)? {
        AuthMethod::Password(_) => {
            let password =
                rpassword::prompt_password(format!("{}@{}'s password: ", conn.username, conn.host))?;
            Ok(Some(password))
        }
        AuthMethod::PublicKey { key_path, .. } if key_is_encrypted(&key_path) => {
            let passphrase = rpassword::prompt_password(format!(
                "Enter passphrase for key {}: ",
                key_path.display()
            ))?;
            Ok(Some(passphrase))
        }
        AuthMethod::PublicKey { .. } => Ok(None),
    }
}

async fn execute(sftp: &SftpClient, command: &Command) -> anyhow::Result<bool> {
    match command {
        Command::Home => {
            println!("{}", sftp.home_dir().await?);
        }
        Command::Exists { dir } => {
            let exists = sftp.exists_dir(dir).await;
            println!("{}", exists);
            return Ok(exists);
        }
        Command::Mkdir { dir } => {
            sftp.mkdir(dir).await?;
        }
        Command::Put {
            remote_dir,
            local_file,
        } => {
            let sent = sftp.upload(remote_dir, local_file).await?;
            println!("{} bytes uploaded", sent);
        }
        Command::Get {
            remote_dir,
            name,
            local_path,
        } => {
            let received = sftp.download(remote_dir, name, local_path).await?;
            println!("{} bytes downloaded", received);
        }
        Command::Ls { dir, ext, long } => {
            if *long {
                for entry in sftp.list_entries(dir).await? {
                    if !path::matches_ext(&entry.name, ext) {
                        continue;
                    }
                    let modified = entry
                        .modified
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "?".to_string());
                    let perms = entry
                        .permissions
                        .map(|p| format!("{:o}", p & 0o7777))
                        .unwrap_or_else(|| "?".to_string());
                    let suffix = if entry.is_directory { "/" } else { "" };
                    println!(
                        "{:>4}  {:>12}  {}  {}{}",
                        perms, entry.size, modified, entry.name, suffix
                    );
                }
            } else {
                for name in sftp.file_list(dir, ext).await? {
                    println!("{}", name);
                }
            }
        }
        Command::Rm { dir, name } => {
            sftp.remove_file(dir, name).await?;
        }
        Command::RmMany { paths } => {
            let removed = sftp.remove_files(paths).await;
            println!("{} of {} files removed", removed, paths.len());
            return Ok(removed == paths.len());
        }
    }
    Ok(true)
}
