//! Runtime configuration from the environment.
//!
//! Variables:
//! - WORDCARD_DATA_DIR: Data directory (default: platform local data dir + `wordcard`)
//! - WORDCARD_DB_FILE: SQLite file name inside the data directory
//! - WORDCARD_BACKUP_NAME: Name of the remote backup object
//! - WORDCARD_SYNC_INTERVAL_SECS: Background sync period, 0 disables it
//! - WORDCARD_LEARNED_THRESHOLD: Repetitions after which an item counts as learned
//! - WORDCARD_HEALTH_URL: Optional connectivity probe
//! - S3_BUCKET, S3_REGION, S3_ENDPOINT, S3_ACCESS_KEY, S3_SECRET_KEY, S3_PREFIX:
//!   Remote object store; sync is disabled without S3_BUCKET

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DB_FILE: &str = "wordcard.db";
pub const DEFAULT_BACKUP_NAME: &str = "wordcard_backup.json";
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_LEARNED_THRESHOLD: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("no data directory available; set WORDCARD_DATA_DIR")]
    NoDataDir,
}

/// S3-compatible remote store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub bucket: String,
    /// Use "auto" for Cloudflare R2.
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_file: String,
    pub backup_name: String,
    /// `None` disables background sync.
    pub sync_interval: Option<Duration>,
    pub learned_threshold: u32,
    pub health_url: Option<String>,
    pub remote: Option<RemoteConfig>,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let data_dir = match var("WORDCARD_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("wordcard"),
        };

        let sync_secs: u64 = parse(&var, "WORDCARD_SYNC_INTERVAL_SECS")?
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);

        let remote = var("S3_BUCKET").map(|bucket| RemoteConfig {
            bucket,
            region: var("S3_REGION").unwrap_or_else(|| "auto".to_string()),
            endpoint: var("S3_ENDPOINT"),
            access_key: var("S3_ACCESS_KEY"),
            secret_key: var("S3_SECRET_KEY"),
            prefix: var("S3_PREFIX").unwrap_or_default(),
        });

        Ok(Self {
            data_dir,
            db_file: var("WORDCARD_DB_FILE").unwrap_or_else(|| DEFAULT_DB_FILE.to_string()),
            backup_name: var("WORDCARD_BACKUP_NAME")
                .unwrap_or_else(|| DEFAULT_BACKUP_NAME.to_string()),
            sync_interval: (sync_secs > 0).then(|| Duration::from_secs(sync_secs)),
            learned_threshold: parse(&var, "WORDCARD_LEARNED_THRESHOLD")?
                .unwrap_or(DEFAULT_LEARNED_THRESHOLD),
            health_url: var("WORDCARD_HEALTH_URL"),
            remote,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }
}

fn parse<T, F>(var: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value })
        })
        .transpose()
}
