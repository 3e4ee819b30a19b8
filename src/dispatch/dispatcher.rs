//! Submission side of notification delivery.
//!
//! `enqueue` writes the durable notification row first, then hands a job to
//! the worker pool over an unbounded channel — fire-and-forget, the caller
//! never waits on transport delivery. Broadcasts fan out in fixed-size
//! batches so a transport outage stalls one sub-group, not the whole run.

use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use tracing::warn;

use super::ActionButton;
use super::CategoryRateLimiter;
use super::NotificationJob;
use super::RateClass;
use crate::DispatchConfig;
use crate::DispatchError;
use crate::MemberId;
use crate::NotificationCategory;
use crate::NotificationTarget;
use crate::Result;
use crate::SledCirculationStore;

/// Counters shared between the dispatcher, the worker pool and the health
/// check.
#[derive(Debug, Default)]
pub struct QueueStats {
    depth: AtomicI64,
    submitted: AtomicU64,
    delivered: AtomicU64,
    abandoned: AtomicU64,
    unlinked: AtomicU64,
}

impl QueueStats {
    pub fn depth(&self) -> i64 {
        self.depth.load(Ordering::Acquire)
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Acquire)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Acquire)
    }

    pub fn unlinked(&self) -> u64 {
        self.unlinked.load(Ordering::Acquire)
    }

    pub(crate) fn record_submitted(&self) {
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.submitted.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_received(&self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_unlinked(&self) {
        self.unlinked.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub total_members: usize,
    pub batches: usize,
    pub submitted: usize,
    pub failed: usize,
}

pub struct NotificationDispatcher {
    store: Arc<SledCirculationStore>,
    job_tx: mpsc::UnboundedSender<NotificationJob>,
    limiter: Arc<CategoryRateLimiter>,
    stats: Arc<QueueStats>,
    batch_size: usize,
}

impl NotificationDispatcher {
    /// Returns the dispatcher plus the receiver end for the worker pool.
    pub fn new(
        store: Arc<SledCirculationStore>,
        config: &DispatchConfig,
    ) -> (Self, mpsc::UnboundedReceiver<NotificationJob>) {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            store,
            job_tx,
            limiter: Arc::new(CategoryRateLimiter::new(config)),
            stats: Arc::new(QueueStats::default()),
            batch_size: config.broadcast_batch_size,
        };
        (dispatcher, job_rx)
    }

    pub fn limiter(&self) -> Arc<CategoryRateLimiter> {
        self.limiter.clone()
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        self.stats.clone()
    }

    /// Persists the durable notification row, then submits the delivery job.
    /// The row is the truth: it survives even if every transport attempt
    /// fails later. Returns the job id.
    pub fn enqueue(
        &self,
        target: NotificationTarget,
        text: String,
        category: NotificationCategory,
        button: Option<ActionButton>,
    ) -> Result<String> {
        self.store.append_notification(target, &text, category)?;

        let job = NotificationJob::new(target, text, category, button);
        let job_id = job.id.clone();
        self.job_tx
            .send(job)
            .map_err(|_| DispatchError::QueueClosed)?;
        self.stats.record_submitted();
        Ok(job_id)
    }

    /// Fans `text` out to every member in fixed-size batches. A failed
    /// submission inside one batch never cancels the following batches;
    /// the run ends with an admin summary notification.
    pub async fn broadcast(
        &self,
        text: &str,
        category: NotificationCategory,
        member_ids: &[MemberId],
    ) -> Result<BroadcastSummary> {
        self.limiter.acquire(RateClass::Broadcast).await;

        let mut batches = 0;
        let mut submitted = 0;
        let mut failed = 0;
        for chunk in member_ids.chunks(self.batch_size) {
            batches += 1;
            for member_id in chunk {
                match self.enqueue(
                    NotificationTarget::Member(*member_id),
                    text.to_string(),
                    category,
                    None,
                ) {
                    Ok(_) => submitted += 1,
                    Err(e) => {
                        failed += 1;
                        warn!(member_id, ?e, "broadcast submission failed");
                    }
                }
            }
            info!(
                batch = batches,
                size = chunk.len(),
                submitted,
                failed,
                "broadcast batch submitted"
            );
        }

        let summary = BroadcastSummary {
            total_members: member_ids.len(),
            batches,
            submitted,
            failed,
        };
        self.enqueue(
            NotificationTarget::Admin,
            format!(
                "Broadcast complete: {} of {} notifications submitted in {} batches ({} failed)",
                summary.submitted, summary.total_members, summary.batches, summary.failed
            ),
            NotificationCategory::System,
            None,
        )?;
        Ok(summary)
    }
}
