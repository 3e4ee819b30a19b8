use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Additional attempts after the first failure
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Single operation timeout (unit: milliseconds)
    #[serde(default = "default_op_timeout_ms")]
    pub timeout_ms: u64,

    /// Fixed backoff floor between attempts (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling; the jitter lands between floor and ceiling
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_op_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Fixed backoff with jitter inside [base_delay_ms, max_delay_ms].
    pub fn jittered_delay(&self) -> Duration {
        let ceiling = self.max_delay_ms.max(self.base_delay_ms);
        let delay = if ceiling == self.base_delay_ms {
            self.base_delay_ms
        } else {
            rand::thread_rng().gen_range(self.base_delay_ms..=ceiling)
        };
        Duration::from_millis(delay)
    }
}

/// Divide strategies by delivery domain
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryPolicies {
    // Outbound chat transport sends
    #[serde(default)]
    pub transport: BackoffPolicy,

    // Verification code delivery (fallback chain tries the next channel)
    #[serde(default)]
    pub verification: BackoffPolicy,
}

// Default value implementation
impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            transport: BackoffPolicy {
                max_retries: 2,
                timeout_ms: 10_000,
                base_delay_ms: 30_000,
                max_delay_ms: 60_000,
            },
            verification: BackoffPolicy {
                max_retries: 1,
                timeout_ms: 10_000,
                base_delay_ms: 5_000,
                max_delay_ms: 15_000,
            },
        }
    }
}

fn default_max_retries() -> usize {
    2
}
fn default_op_timeout_ms() -> u64 {
    10_000
}
fn default_base_delay_ms() -> u64 {
    30_000
}
fn default_max_delay_ms() -> u64 {
    60_000
}
