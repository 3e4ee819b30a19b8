use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::retry::retry_with_timeout;
use crate::config::BackoffPolicy;
use crate::CirculationError;
use crate::DispatchError;
use crate::Error;

fn fast_policy(max_retries: usize) -> BackoffPolicy {
    BackoffPolicy {
        max_retries,
        timeout_ms: 50,
        base_delay_ms: 10,
        max_delay_ms: 20,
    }
}

#[tokio::test(start_paused = true)]
async fn succeeds_on_third_attempt_after_two_transient_failures() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let result = retry_with_timeout(
        move || {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Dispatch(DispatchError::Transport("boom".into())))
                } else {
                    Ok(7u32)
                }
            }
        },
        &fast_policy(2),
    )
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn returns_last_error_after_exhausting_retries() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let result: crate::Result<()> = retry_with_timeout(
        move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Dispatch(DispatchError::Transport("down".into())))
            }
        },
        &fast_policy(2),
    )
    .await;

    assert!(matches!(result, Err(Error::Dispatch(DispatchError::Transport(_)))));
    // One initial attempt plus two retries.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_error_aborts_without_further_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let result: crate::Result<()> = retry_with_timeout(
        move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Circulation(CirculationError::BookNotFound(1)))
            }
        },
        &fast_policy(5),
    )
    .await;

    assert!(matches!(result, Err(Error::Circulation(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_task_times_out_and_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    let result = retry_with_timeout(
        move || {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    // Never resolves; the per-call timeout must fire.
                    futures::future::pending::<()>().await;
                }
                Ok(1u8)
            }
        },
        &fast_policy(1),
    )
    .await;

    assert_eq!(result.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
