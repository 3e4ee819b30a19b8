//! Periodic probe of the store, the dispatch queue and the worker pool.
//!
//! All failing subsystems are folded into a single admin alert per run so a
//! bad night produces one message, not one per subsystem.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::error;
use tracing::info;
use tracing::warn;

use crate::utils::time::unix_secs;
use crate::DispatchConfig;
use crate::NotificationCategory;
use crate::NotificationDispatcher;
use crate::NotificationTarget;
use crate::QueueStats;
use crate::Result;
use crate::SledCirculationStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSummary {
    pub healthy: bool,
    pub failing: Vec<String>,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        if self.healthy {
            write!(f, "all subsystems healthy")
        } else {
            write!(f, "failing subsystems: {}", self.failing.join(", "))
        }
    }
}

pub struct HealthChecker {
    store: Arc<SledCirculationStore>,
    dispatcher: Arc<NotificationDispatcher>,
    stats: Arc<QueueStats>,
    worker_heartbeat: Arc<AtomicU64>,
    queue_depth_threshold: i64,
    worker_stall_secs: u64,
}

impl HealthChecker {
    pub fn new(
        store: Arc<SledCirculationStore>,
        dispatcher: Arc<NotificationDispatcher>,
        stats: Arc<QueueStats>,
        worker_heartbeat: Arc<AtomicU64>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            stats,
            worker_heartbeat,
            queue_depth_threshold: config.queue_depth_alert_threshold,
            worker_stall_secs: config.worker_stall_alert_secs,
        }
    }

    pub fn run(&self) -> Result<HealthSummary> {
        let mut failing = Vec::new();

        if let Err(e) = self.store.health_probe() {
            warn!(?e, "store probe failed");
            failing.push("store".to_string());
        }

        let depth = self.stats.depth();
        if depth > self.queue_depth_threshold {
            failing.push(format!("dispatch queue (depth {depth})"));
        }

        // A backlog that no worker has touched within the stall window.
        if depth > 0 {
            let heartbeat = self.worker_heartbeat.load(Ordering::Acquire);
            if unix_secs().saturating_sub(heartbeat) > self.worker_stall_secs {
                failing.push("worker pool (stalled)".to_string());
            }
        }

        let summary = HealthSummary {
            healthy: failing.is_empty(),
            failing,
        };
        if summary.healthy {
            info!("health check: {summary}");
        } else {
            error!("health check: {summary}");
            // One alert covering every failing subsystem.
            self.dispatcher.enqueue(
                NotificationTarget::Admin,
                format!("Health check failed: {}", summary.failing.join(", ")),
                NotificationCategory::System,
                None,
            )?;
        }
        Ok(summary)
    }
}
