use tokio::time::sleep;
use tokio::time::timeout;
use tracing::warn;

use crate::config::BackoffPolicy;
use crate::DispatchError;
use crate::Result;

/// Runs `task` under the policy's per-call timeout, retrying transient
/// failures with the policy's jittered fixed backoff. Returns the last error
/// once `max_retries` additional attempts are exhausted. Non-retryable errors
/// abort immediately.
pub(crate) async fn retry_with_timeout<F, T, P>(
    task: F,
    policy: &BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,
    T: std::future::Future<Output = Result<P>>,
{
    let attempts = policy.max_retries + 1;
    let mut last_err = None;
    for attempt in 1..=attempts {
        match timeout(policy.timeout(), task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(error)) => {
                if !error.is_retryable() {
                    return Err(error);
                }
                warn!("attempt {}/{} failed with error: {:?}", attempt, attempts, &error);
                last_err = Some(error);
            }
            Err(_elapsed) => {
                warn!("attempt {}/{} timed out after {:?}", attempt, attempts, policy.timeout());
                last_err = Some(DispatchError::Timeout(policy.timeout()).into());
            }
        };

        if attempt < attempts {
            sleep(policy.jittered_delay()).await;
        }
    }
    Err(last_err.expect("at least one attempt must have run"))
}
