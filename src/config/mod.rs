//! Configuration management for the circulation engine.
//!
//! Provides hierarchical configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Optional override config file
//! 3. Environment variables (highest priority, `BIBLIO__` prefix)

mod auth;
mod circulation;
mod dispatch;
mod retry;
mod scheduler;
mod store;
pub use auth::*;
pub use circulation::*;
pub use dispatch::*;
pub use retry::*;
pub use scheduler::*;
pub use store::*;

#[cfg(test)]
mod config_test;

//---
use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EngineConfig {
    /// Record store paths and backup retention
    #[serde(default)]
    pub store: StoreConfig,
    /// Loan period, extension window and borrow limit table
    #[serde(default)]
    pub circulation: CirculationConfig,
    /// Login failure counting and lockout duration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Worker pool, batching and rate ceilings for notifications
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Cadence of the time-driven jobs
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Retry policies per delivery domain
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl EngineConfig {
    /// Load configuration from defaults overlaid with `BIBLIO__`-prefixed
    /// environment variables.
    pub fn new() -> Result<Self> {
        let config: EngineConfig = Config::builder()
            .add_source(Config::try_from(&EngineConfig::default())?)
            .add_source(Self::env_source())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays an additional config file between the defaults and the
    /// environment variables.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: EngineConfig = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path).required(true))
            .add_source(Self::env_source())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn env_source() -> Environment {
        Environment::with_prefix("BIBLIO")
            .separator("__")
            .ignore_empty(true)
            .try_parsing(true)
    }

    /// Validates all subsystem configurations
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.circulation.validate()?;
        self.auth.validate()?;
        self.dispatch.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}
