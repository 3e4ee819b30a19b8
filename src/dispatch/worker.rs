//! Delivery side of notification dispatch: a semaphore-bounded worker pool
//! pulling jobs off the queue, pacing sends through the rate limiter and
//! retrying transient transport failures with fixed backoff.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::CategoryRateLimiter;
use super::DeliveryDirectory;
use super::NotificationJob;
use super::QueueStats;
use super::RateClass;
use super::Transport;
use crate::config::BackoffPolicy;
use crate::utils::retry::retry_with_timeout;
use crate::utils::time::unix_secs;
use crate::DispatchConfig;
use crate::DispatchError;
use crate::NotificationCategory;
use crate::NotificationTarget;
use crate::Result;
use crate::SledCirculationStore;

/// Everything a spawned delivery task needs, cloned per job.
#[derive(Clone)]
pub(crate) struct DeliveryContext {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) directory: Arc<dyn DeliveryDirectory>,
    pub(crate) store: Arc<SledCirculationStore>,
    pub(crate) limiter: Arc<CategoryRateLimiter>,
    pub(crate) stats: Arc<QueueStats>,
    pub(crate) policy: BackoffPolicy,
    pub(crate) admin_handle: String,
    pub(crate) cancel: CancellationToken,
}

pub struct DispatchWorkerPool {
    job_rx: Option<mpsc::UnboundedReceiver<NotificationJob>>,
    ctx: DeliveryContext,
    concurrency: Arc<Semaphore>,
    heartbeat: Arc<AtomicU64>,
    // Shutdown signal
    shutdown_signal: watch::Receiver<()>,
}

impl DispatchWorkerPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_rx: mpsc::UnboundedReceiver<NotificationJob>,
        transport: Arc<dyn Transport>,
        directory: Arc<dyn DeliveryDirectory>,
        store: Arc<SledCirculationStore>,
        limiter: Arc<CategoryRateLimiter>,
        stats: Arc<QueueStats>,
        config: &DispatchConfig,
        policy: BackoffPolicy,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            job_rx: Some(job_rx),
            ctx: DeliveryContext {
                transport,
                directory,
                store,
                limiter,
                stats,
                policy,
                admin_handle: config.admin_handle.clone(),
                cancel: CancellationToken::new(),
            },
            concurrency: Arc::new(Semaphore::new(config.worker_count)),
            heartbeat: Arc::new(AtomicU64::new(0)),
            shutdown_signal,
        }
    }

    /// Age source for the health check: unix seconds of the last queue pull.
    pub fn heartbeat(&self) -> Arc<AtomicU64> {
        self.heartbeat.clone()
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut job_rx = self
            .job_rx
            .take()
            .expect("Expected a job recv but found None");
        let mut shutdown_signal = self.shutdown_signal.clone();

        loop {
            tokio::select! {
                // P0: shutdown received;
                _ = shutdown_signal.changed() => {
                    warn!("[DispatchWorkerPool] shutdown signal received.");
                    self.ctx.cancel.cancel();
                    return Ok(());
                }

                maybe_job = job_rx.recv() => {
                    let Some(job) = maybe_job else {
                        warn!("[DispatchWorkerPool] queue closed, draining done.");
                        return Ok(());
                    };
                    self.heartbeat.store(unix_secs(), Ordering::Release);
                    self.ctx.stats.record_received();

                    let permit = self
                        .concurrency
                        .clone()
                        .acquire_owned()
                        .await
                        .expect("worker semaphore is never closed");
                    let ctx = self.ctx.clone();
                    tokio::spawn(async move {
                        deliver(ctx, job).await;
                        drop(permit);
                    });
                }
            }
        }
    }
}

/// Delivers one job: resolve the recipient handle, pace through the
/// individual-send bucket, then send with bounded retries. Abandonment is
/// reported to the admin channel, never silently dropped.
pub(crate) async fn deliver(
    ctx: DeliveryContext,
    job: NotificationJob,
) {
    ctx.limiter.acquire(RateClass::Individual).await;

    let recipient = match &job.target {
        NotificationTarget::Admin => ctx.admin_handle.clone(),
        NotificationTarget::Member(member_id) => match ctx.directory.chat_handle(*member_id) {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                // Unlinked account: terminal, not a retryable failure.
                warn!(
                    member_id,
                    job_id = %job.id,
                    "recipient has no linked delivery address; dropping job"
                );
                ctx.stats.record_unlinked();
                return;
            }
            Err(e) => {
                error!(member_id, job_id = %job.id, ?e, "address lookup failed");
                ctx.stats.record_abandoned();
                report_abandonment(&ctx, &job, 0).await;
                return;
            }
        },
    };

    let send = || ctx.transport.send(&recipient, &job.text, job.button.as_ref());
    let attempts = ctx.policy.max_retries + 1;
    tokio::select! {
        _ = ctx.cancel.cancelled() => {
            warn!(job_id = %job.id, "delivery cancelled by shutdown");
        }
        result = retry_with_timeout(send, &ctx.policy) => match result {
            Ok(()) => {
                ctx.stats.record_delivered();
                debug!(job_id = %job.id, category = %job.category, "job delivered");
            }
            Err(cause) => {
                let abandoned = DispatchError::RetryExhausted {
                    job_id: job.id.clone(),
                    attempts,
                };
                error!(job_id = %job.id, ?cause, "{abandoned}");
                ctx.stats.record_abandoned();
                report_abandonment(&ctx, &job, attempts).await;
            }
        }
    }
}

async fn report_abandonment(
    ctx: &DeliveryContext,
    job: &NotificationJob,
    attempts: usize,
) {
    let text = format!(
        "Notification job {} ({}) abandoned after {} attempts",
        job.id, job.category, attempts
    );
    if let Err(e) = ctx
        .store
        .append_notification(NotificationTarget::Admin, &text, NotificationCategory::System)
    {
        error!(job_id = %job.id, ?e, "failed to persist abandonment report");
    }
    // One direct best-effort send; no second retry loop for the report.
    if let Err(e) = ctx.transport.send(&ctx.admin_handle, &text, None).await {
        warn!(job_id = %job.id, ?e, "failed to deliver abandonment report");
    }
}
