use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Worker pool sizing, broadcast batching and rate ceilings for the
/// notification dispatcher.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Concurrent transport deliveries
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Members per broadcast sub-group
    #[serde(default = "default_broadcast_batch_size")]
    pub broadcast_batch_size: usize,

    /// Ceiling for individual notification sends per second
    #[serde(default = "default_individual_rate_per_sec")]
    pub individual_rate_per_sec: u32,

    /// Ceiling for whole broadcast runs per minute
    #[serde(default = "default_broadcast_rate_per_min")]
    pub broadcast_rate_per_min: u32,

    /// Transport handle of the admin channel
    #[serde(default = "default_admin_handle")]
    pub admin_handle: String,

    /// Queue depth beyond which the health check flags the dispatcher
    #[serde(default = "default_queue_depth_alert_threshold")]
    pub queue_depth_alert_threshold: i64,

    /// A non-empty queue with a worker heartbeat older than this is flagged
    #[serde(default = "default_worker_stall_alert_secs")]
    pub worker_stall_alert_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            broadcast_batch_size: default_broadcast_batch_size(),
            individual_rate_per_sec: default_individual_rate_per_sec(),
            broadcast_rate_per_min: default_broadcast_rate_per_min(),
            admin_handle: default_admin_handle(),
            queue_depth_alert_threshold: default_queue_depth_alert_threshold(),
            worker_stall_alert_secs: default_worker_stall_alert_secs(),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::Config(ConfigError::Message(
                "worker_count must be at least 1".into(),
            )));
        }
        if self.broadcast_batch_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "broadcast_batch_size must be at least 1".into(),
            )));
        }
        if self.individual_rate_per_sec == 0 || self.broadcast_rate_per_min == 0 {
            return Err(Error::Config(ConfigError::Message(
                "rate ceilings must be at least 1".into(),
            )));
        }
        if self.admin_handle.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "admin_handle must not be empty".into(),
            )));
        }
        Ok(())
    }
}

fn default_worker_count() -> usize {
    4
}
fn default_broadcast_batch_size() -> usize {
    50
}
fn default_individual_rate_per_sec() -> u32 {
    10
}
fn default_broadcast_rate_per_min() -> u32 {
    1
}
fn default_admin_handle() -> String {
    "library-admin".to_string()
}
fn default_queue_depth_alert_threshold() -> i64 {
    10_000
}
fn default_worker_stall_alert_secs() -> u64 {
    900
}
