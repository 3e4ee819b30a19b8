use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::dispatcher::QueueStats;
use super::rate_limiter::CategoryRateLimiter;
use super::worker::deliver;
use super::worker::DeliveryContext;
use super::worker::DispatchWorkerPool;
use super::NotificationJob;
use super::Transport;
use crate::config::BackoffPolicy;
use crate::test_utils::seed_member;
use crate::test_utils::temp_store;
use crate::test_utils::test_dispatcher;
use crate::test_utils::RecordingTransport;
use crate::DispatchConfig;
use crate::NotificationCategory;
use crate::NotificationTarget;
use crate::SledCirculationStore;

fn context(
    transport: Arc<RecordingTransport>,
    store: Arc<SledCirculationStore>,
) -> DeliveryContext {
    let config = DispatchConfig::default();
    DeliveryContext {
        transport: transport as Arc<dyn Transport>,
        directory: store.clone(),
        store,
        limiter: Arc::new(CategoryRateLimiter::new(&config)),
        stats: Arc::new(QueueStats::default()),
        policy: BackoffPolicy::default(),
        admin_handle: config.admin_handle,
        cancel: CancellationToken::new(),
    }
}

fn member_job(member_id: u64) -> NotificationJob {
    NotificationJob::new(
        NotificationTarget::Member(member_id),
        "your book is ready".to_string(),
        NotificationCategory::ReservationAvailable,
        None,
    )
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_and_deliver_exactly_once() {
    let (_dir, store) = temp_store();
    seed_member(&store, 7, "standard", Some("@seven"));
    let transport = Arc::new(RecordingTransport::failing_first(2));
    let ctx = context(transport.clone(), store.clone());

    // The durable row comes from the original enqueue, before any attempt.
    let (dispatcher, mut job_rx) = test_dispatcher(store.clone());
    dispatcher
        .enqueue(
            NotificationTarget::Member(7),
            "your book is ready".to_string(),
            NotificationCategory::ReservationAvailable,
            None,
        )
        .unwrap();
    let job = job_rx.try_recv().unwrap();

    deliver(ctx.clone(), job).await;

    // Two failures, success on the third attempt; delivered exactly once.
    assert_eq!(transport.attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(transport.sent_to("@seven").len(), 1);
    assert_eq!(ctx.stats.delivered(), 1);
    assert_eq!(ctx.stats.abandoned(), 0);
    // Retries never mint additional durable rows.
    assert_eq!(store.notifications_for_member(7).unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_abandon_the_job_and_report_to_admin() {
    let (_dir, store) = temp_store();
    seed_member(&store, 7, "standard", Some("@seven"));
    // Three job attempts fail; the admin report itself then succeeds.
    let transport = Arc::new(RecordingTransport::failing_first(3));
    let ctx = context(transport.clone(), store.clone());

    deliver(ctx.clone(), member_job(7)).await;

    assert_eq!(ctx.stats.delivered(), 0);
    assert_eq!(ctx.stats.abandoned(), 1);
    assert!(transport.sent_to("@seven").is_empty());

    // Abandonment is persisted and pushed to the admin handle.
    let admin_rows = store.admin_notifications().unwrap();
    assert_eq!(admin_rows.len(), 1);
    assert!(admin_rows[0].text.contains("abandoned after 3 attempts"));
    assert_eq!(transport.sent_to(&ctx.admin_handle).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_delivery_address_is_terminal_without_retries() {
    let (_dir, store) = temp_store();
    seed_member(&store, 7, "standard", None);
    let transport = Arc::new(RecordingTransport::new());
    let ctx = context(transport.clone(), store.clone());

    deliver(ctx.clone(), member_job(7)).await;

    // No transport attempt at all, and no admin alert: a warning, not an
    // abandonment.
    assert_eq!(transport.attempts.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(ctx.stats.unlinked(), 1);
    assert_eq!(ctx.stats.abandoned(), 0);
    assert!(store.admin_notifications().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn admin_jobs_go_to_the_admin_handle() {
    let (_dir, store) = temp_store();
    let transport = Arc::new(RecordingTransport::new());
    let ctx = context(transport.clone(), store.clone());

    deliver(
        ctx.clone(),
        NotificationJob::new(
            NotificationTarget::Admin,
            "nightly report".to_string(),
            NotificationCategory::System,
            None,
        ),
    )
    .await;

    assert_eq!(transport.sent_to(&ctx.admin_handle).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn pool_drains_jobs_and_stops_on_shutdown() {
    let (_dir, store) = temp_store();
    seed_member(&store, 1, "standard", Some("@one"));
    seed_member(&store, 2, "standard", Some("@two"));
    let transport = Arc::new(RecordingTransport::new());
    let (dispatcher, job_rx) = test_dispatcher(store.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let mut pool = DispatchWorkerPool::new(
        job_rx,
        transport.clone(),
        store.clone(),
        store.clone(),
        dispatcher.limiter(),
        dispatcher.stats(),
        &DispatchConfig::default(),
        BackoffPolicy::default(),
        shutdown_rx,
    );
    let handle = tokio::spawn(async move { pool.run().await });

    dispatcher
        .enqueue(
            NotificationTarget::Member(1),
            "a".to_string(),
            NotificationCategory::System,
            None,
        )
        .unwrap();
    dispatcher
        .enqueue(
            NotificationTarget::Member(2),
            "b".to_string(),
            NotificationCategory::System,
            None,
        )
        .unwrap();

    // Let the pool pull and deliver both jobs.
    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
    assert_eq!(transport.sent.lock().len(), 2);
    assert_eq!(dispatcher.stats().depth(), 0);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
