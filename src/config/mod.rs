//! Configuration surface: clap CLI flags merged with an optional TOML file.
//!
//! TOML values override CLI values where present, mirroring how the server
//! that this tool runs next to resolves its own config. Credentials live in
//! the file only, never on the command line.

mod file_config;

pub use file_config::{BackupConfig, FileConfig, KitsuConfig, S3Config};

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::backup::BackupSettings;
use crate::object_store::S3Settings;

/// CLI arguments that take part in config resolution.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub threads: i64,
    pub poll_minutes: u64,
    pub staging_root: PathBuf,
    pub state_db_path: PathBuf,
    pub kitsu_timeout_sec: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            poll_minutes: 15,
            staging_root: PathBuf::from("./staging"),
            state_db_path: PathBuf::from("./sync_state.db"),
            kitsu_timeout_sec: 300,
        }
    }
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub kitsu_host: String,
    pub kitsu_email: String,
    pub kitsu_password: String,
    pub kitsu_timeout_sec: u64,

    pub poll_minutes: u64,
    pub state_db_path: PathBuf,

    pub backup: BackupSettings,
    pub s3: S3Settings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and the TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let kitsu = file_config.kitsu.unwrap_or_default();
        let backup = file_config.backup.unwrap_or_default();
        let s3 = backup.s3.clone().unwrap_or_default();

        let kitsu_host = match kitsu.host {
            Some(host) if !host.is_empty() => host,
            _ => bail!("kitsu.host must be set in the config file"),
        };
        let kitsu_email = match kitsu.email {
            Some(email) if !email.is_empty() => email,
            _ => bail!("kitsu.email must be set in the config file"),
        };
        let kitsu_password = match kitsu.password {
            Some(password) if !password.is_empty() => password,
            _ => bail!("kitsu.password must be set in the config file"),
        };

        let access_key = s3.access_key.unwrap_or_default();
        let secret_key = s3.secret_key.unwrap_or_default();
        if access_key.is_empty() || secret_key.is_empty() {
            bail!("backup.s3.access_key and backup.s3.secret_key must be set");
        }
        let bucket = match s3.bucket {
            Some(bucket) if !bucket.is_empty() => bucket,
            _ => bail!("backup.s3.bucket must be set"),
        };
        let region = match s3.region {
            Some(region) if !region.is_empty() => region,
            _ => bail!("backup.s3.region must be set"),
        };
        let root_folder = match s3.root_folder {
            Some(root) if !root.is_empty() => root,
            _ => bail!("backup.s3.root_folder must be set"),
        };

        let staging_root = backup
            .staging_root
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.staging_root.clone());
        if staging_root.as_os_str().is_empty() {
            bail!("backup.staging_root must not be empty");
        }

        let state_db_path = backup
            .state_db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.state_db_path.clone());

        Ok(AppConfig {
            kitsu_host,
            kitsu_email,
            kitsu_password,
            kitsu_timeout_sec: kitsu.timeout_sec.unwrap_or(cli.kitsu_timeout_sec),
            poll_minutes: backup.poll_minutes.unwrap_or(cli.poll_minutes),
            state_db_path,
            backup: BackupSettings {
                root_folder,
                staging_root,
                ignore_extensions: backup.ignore_extensions.unwrap_or_default(),
                threads: backup.threads.unwrap_or(cli.threads),
            },
            s3: S3Settings {
                access_key,
                secret_key,
                bucket,
                endpoint: s3.endpoint.filter(|e| !e.is_empty()),
                region,
                force_path_style: s3.force_path_style.unwrap_or(false),
            },
        })
    }
}
