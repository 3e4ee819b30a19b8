use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Paths for the embedded record store, its backups and the log files.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Root directory of the sled database
    #[serde(default = "default_db_root_dir")]
    pub db_root_dir: PathBuf,

    /// Directory where backup dumps are written
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Dumps older than this window are pruned after each backup run
    #[serde(default = "default_backup_retention_days")]
    pub backup_retention_days: i64,

    /// Directory for the daemon's log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_root_dir: default_db_root_dir(),
            backup_dir: default_backup_dir(),
            backup_retention_days: default_backup_retention_days(),
            log_dir: default_log_dir(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backup_retention_days < 1 {
            return Err(Error::Config(ConfigError::Message(
                "backup_retention_days must be at least 1".into(),
            )));
        }
        Ok(())
    }
}

fn default_db_root_dir() -> PathBuf {
    PathBuf::from("./data/db")
}
fn default_backup_dir() -> PathBuf {
    PathBuf::from("./data/backups")
}
fn default_backup_retention_days() -> i64 {
    30
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
