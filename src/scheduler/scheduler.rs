//! Time-driven trigger loop: overdue scan, due-soon scan, health check and
//! backup, each on its own cadence, sharing one `tokio::select!` loop with
//! the shutdown watch channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::HealthChecker;
use super::HealthSummary;
use super::LoanScanner;
use super::ScanSummary;
use crate::BackupManager;
use crate::BackupSummary;
use crate::NotificationCategory;
use crate::NotificationDispatcher;
use crate::NotificationTarget;
use crate::Result;
use crate::SchedulerConfig;

pub struct Scheduler {
    scanner: Arc<LoanScanner>,
    health: Arc<HealthChecker>,
    backup: Arc<BackupManager>,
    dispatcher: Arc<NotificationDispatcher>,
    config: SchedulerConfig,
    // Shutdown signal
    shutdown_signal: watch::Receiver<()>,
}

impl Scheduler {
    pub fn new(
        scanner: Arc<LoanScanner>,
        health: Arc<HealthChecker>,
        backup: Arc<BackupManager>,
        dispatcher: Arc<NotificationDispatcher>,
        config: SchedulerConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            scanner,
            health,
            backup,
            dispatcher,
            config,
            shutdown_signal,
        }
    }

    /// Interval that waits a full period before the first tick and delays
    /// missed ticks instead of bursting.
    fn cadence(secs: u64) -> tokio::time::Interval {
        let period = Duration::from_secs(secs);
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut overdue = Self::cadence(self.config.overdue_scan_interval_secs);
        let mut due_soon = Self::cadence(self.config.due_soon_scan_interval_secs);
        let mut health = Self::cadence(self.config.health_check_interval_secs);
        let mut backup = Self::cadence(self.config.backup_interval_secs);
        let mut shutdown_signal = self.shutdown_signal.clone();

        info!("scheduler started");
        loop {
            tokio::select! {
                // P0: shutdown received;
                _ = shutdown_signal.changed() => {
                    warn!("[Scheduler] shutdown signal received.");
                    return Ok(());
                }

                _ = overdue.tick() => {
                    if let Err(e) = self.run_overdue_scan() {
                        error!(?e, "overdue scan failed");
                    }
                }

                _ = due_soon.tick() => {
                    if let Err(e) = self.run_due_soon_scan() {
                        error!(?e, "due-soon scan failed");
                    }
                }

                _ = health.tick() => {
                    if let Err(e) = self.run_health_check() {
                        error!(?e, "health check failed");
                    }
                }

                _ = backup.tick() => {
                    if let Err(e) = self.run_backup() {
                        error!(?e, "backup failed");
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Entry points, also directly callable by the admin surface.

    pub fn run_overdue_scan(&self) -> Result<ScanSummary> {
        self.scanner.run_overdue_scan()
    }

    pub fn run_due_soon_scan(&self) -> Result<ScanSummary> {
        self.scanner.run_due_soon_scan()
    }

    pub fn run_health_check(&self) -> Result<HealthSummary> {
        self.health.run()
    }

    /// Runs a backup and reports the outcome to the admin channel either
    /// way.
    pub fn run_backup(&self) -> Result<BackupSummary> {
        match self.backup.run() {
            Ok(summary) => {
                if let Err(e) = self.dispatcher.enqueue(
                    NotificationTarget::Admin,
                    format!("Backup succeeded: {summary}"),
                    NotificationCategory::System,
                    None,
                ) {
                    error!(?e, "failed to report backup success");
                }
                Ok(summary)
            }
            Err(e) => {
                if let Err(report_err) = self.dispatcher.enqueue(
                    NotificationTarget::Admin,
                    format!("Backup failed: {e}"),
                    NotificationCategory::System,
                    None,
                ) {
                    error!(?report_err, "failed to report backup failure");
                }
                Err(e)
            }
        }
    }
}
