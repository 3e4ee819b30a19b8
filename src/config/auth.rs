use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Login guard thresholds. The lockout state is process-local and resets on
/// restart; it is a throttle, not an authorization boundary.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct AuthConfig {
    /// Consecutive failures that trigger a lockout
    #[serde(default = "default_max_login_failures")]
    pub max_login_failures: u32,

    /// Lockout duration in seconds
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_login_failures: default_max_login_failures(),
            lockout_secs: default_lockout_secs(),
        }
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_login_failures == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_login_failures must be at least 1".into(),
            )));
        }
        if self.lockout_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "lockout_secs must be at least 1".into(),
            )));
        }
        Ok(())
    }
}

fn default_max_login_failures() -> u32 {
    3
}
fn default_lockout_secs() -> u64 {
    300
}
