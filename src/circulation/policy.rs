//! Lending policy: loan period, extension window and the per-status borrow
//! limit table.

use std::collections::HashMap;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use lazy_static::lazy_static;

use crate::CirculationConfig;

lazy_static! {
    /// Built-in two-tier limit table; overridable via configuration.
    static ref BUILTIN_BORROW_LIMITS: HashMap<String, u32> = {
        let mut limits = HashMap::new();
        limits.insert("standard".to_string(), 5);
        limits.insert("premium".to_string(), 10);
        limits
    };
}

pub fn default_borrow_limits() -> HashMap<String, u32> {
    BUILTIN_BORROW_LIMITS.clone()
}

#[derive(Debug, Clone)]
pub struct CirculationPolicy {
    loan_period: Duration,
    extension: Duration,
    max_extensions: u32,
    borrow_limits: HashMap<String, u32>,
}

impl CirculationPolicy {
    pub fn from_config(config: &CirculationConfig) -> Self {
        Self {
            loan_period: Duration::days(config.loan_period_days),
            extension: Duration::days(config.extension_days),
            max_extensions: config.max_extensions,
            borrow_limits: config.borrow_limits.clone(),
        }
    }

    /// Active-loan ceiling for a member status. A status outside the table
    /// resolves to 0: deny-by-default, not an oversight.
    pub fn borrow_limit(
        &self,
        status: &str,
    ) -> u32 {
        self.borrow_limits.get(status).copied().unwrap_or(0)
    }

    pub fn due_date(
        &self,
        borrowed_at: DateTime<Utc>,
    ) -> DateTime<Utc> {
        borrowed_at + self.loan_period
    }

    pub fn extension(&self) -> Duration {
        self.extension
    }

    pub fn max_extensions(&self) -> u32 {
        self.max_extensions
    }
}
