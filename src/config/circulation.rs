use std::collections::HashMap;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::circulation::default_borrow_limits;
use crate::Error;
use crate::Result;

/// Lending policy knobs: loan period, extension window and the per-status
/// borrow limit table.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CirculationConfig {
    /// Days a fresh loan runs before it is due
    #[serde(default = "default_loan_period_days")]
    pub loan_period_days: i64,

    /// Days added to the due date by one extension
    #[serde(default = "default_extension_days")]
    pub extension_days: i64,

    /// Extensions allowed per loan
    #[serde(default = "default_max_extensions")]
    pub max_extensions: u32,

    /// Active-loan ceiling per member status. A status missing from the
    /// table resolves to 0 and blocks borrowing entirely.
    #[serde(default = "default_borrow_limits")]
    pub borrow_limits: HashMap<String, u32>,
}

impl Default for CirculationConfig {
    fn default() -> Self {
        Self {
            loan_period_days: default_loan_period_days(),
            extension_days: default_extension_days(),
            max_extensions: default_max_extensions(),
            borrow_limits: default_borrow_limits(),
        }
    }
}

impl CirculationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.loan_period_days < 1 {
            return Err(Error::Config(ConfigError::Message(
                "loan_period_days must be at least 1".into(),
            )));
        }
        if self.extension_days < 1 {
            return Err(Error::Config(ConfigError::Message(
                "extension_days must be at least 1".into(),
            )));
        }
        if self.borrow_limits.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "borrow_limits must define at least one member status".into(),
            )));
        }
        Ok(())
    }
}

fn default_loan_period_days() -> i64 {
    14
}
fn default_extension_days() -> i64 {
    7
}
fn default_max_extensions() -> u32 {
    1
}
