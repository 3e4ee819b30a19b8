use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Cadence of the time-driven jobs. Re-entrancy of each job is excluded by
/// wall-clock cadence, not by locking.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct SchedulerConfig {
    #[serde(default = "default_overdue_scan_interval_secs")]
    pub overdue_scan_interval_secs: u64,

    #[serde(default = "default_due_soon_scan_interval_secs")]
    pub due_soon_scan_interval_secs: u64,

    /// Loans due within this many days get a reminder
    #[serde(default = "default_due_soon_lookahead_days")]
    pub due_soon_lookahead_days: i64,

    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    #[serde(default = "default_backup_interval_secs")]
    pub backup_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            overdue_scan_interval_secs: default_overdue_scan_interval_secs(),
            due_soon_scan_interval_secs: default_due_soon_scan_interval_secs(),
            due_soon_lookahead_days: default_due_soon_lookahead_days(),
            health_check_interval_secs: default_health_check_interval_secs(),
            backup_interval_secs: default_backup_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("overdue_scan_interval_secs", self.overdue_scan_interval_secs),
            ("due_soon_scan_interval_secs", self.due_soon_scan_interval_secs),
            ("health_check_interval_secs", self.health_check_interval_secs),
            ("backup_interval_secs", self.backup_interval_secs),
        ] {
            if value == 0 {
                return Err(Error::Config(ConfigError::Message(format!(
                    "{name} must be at least 1"
                ))));
            }
        }
        if self.due_soon_lookahead_days < 1 {
            return Err(Error::Config(ConfigError::Message(
                "due_soon_lookahead_days must be at least 1".into(),
            )));
        }
        Ok(())
    }
}

fn default_overdue_scan_interval_secs() -> u64 {
    86_400
}
fn default_due_soon_scan_interval_secs() -> u64 {
    86_400
}
fn default_due_soon_lookahead_days() -> i64 {
    2
}
fn default_health_check_interval_secs() -> u64 {
    300
}
fn default_backup_interval_secs() -> u64 {
    86_400
}
