//! Per-member login attempt counting with time-boxed lockout.
//!
//! State machine per member: Clean → Counting(n) → Locked(until) → Clean.
//! The map is process-local and lost on restart; this is a throttle, not an
//! authorization boundary, and multi-process deployments accept the
//! resulting per-process counters.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use tokio::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::AuthConfig;
use crate::MemberId;
use crate::NotificationCategory;
use crate::NotificationDispatcher;
use crate::NotificationTarget;
use crate::Result;

/// Password checking is owned by the collaborating layer; the guard only
/// counts outcomes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(
        &self,
        member_id: MemberId,
        password: &str,
    ) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Ok,
    Locked { seconds_remaining: u64 },
    Failed { attempts_remaining: u32 },
}

#[derive(Debug, Default)]
struct LockoutEntry {
    failures: u32,
    locked_until: Option<Instant>,
}

pub struct LoginGuard {
    verifier: Arc<dyn CredentialVerifier>,
    dispatcher: Arc<NotificationDispatcher>,
    entries: DashMap<MemberId, LockoutEntry>,
    max_failures: u32,
    lockout: Duration,
}

impl LoginGuard {
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        dispatcher: Arc<NotificationDispatcher>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            verifier,
            dispatcher,
            entries: DashMap::new(),
            max_failures: config.max_login_failures,
            lockout: Duration::from_secs(config.lockout_secs),
        }
    }

    /// Checks the password unless the member is locked out. A lockout
    /// short-circuits before the verifier is consulted.
    pub async fn check_login(
        &self,
        member_id: MemberId,
        password: &str,
    ) -> Result<LoginOutcome> {
        if let Some(seconds_remaining) = self.locked_remaining(member_id) {
            return Ok(LoginOutcome::Locked { seconds_remaining });
        }

        let ok = self.verifier.verify(member_id, password).await?;

        // Decide while holding the entry, alert after releasing it.
        let (outcome, alert) = {
            let mut entry = self.entries.entry(member_id).or_default();
            if ok {
                *entry = LockoutEntry::default();
                (LoginOutcome::Ok, None)
            } else {
                entry.failures += 1;
                if entry.failures >= self.max_failures {
                    entry.locked_until = Some(Instant::now() + self.lockout);
                    warn!(member_id, failures = entry.failures, "member locked out");
                    (
                        LoginOutcome::Locked {
                            seconds_remaining: self.lockout.as_secs(),
                        },
                        Some(format!(
                            "Security alert: member {} locked out after {} failed login attempts",
                            member_id, entry.failures
                        )),
                    )
                } else {
                    (
                        LoginOutcome::Failed {
                            attempts_remaining: self.max_failures - entry.failures,
                        },
                        None,
                    )
                }
            }
        };

        if let Some(text) = alert {
            self.dispatcher.enqueue(
                NotificationTarget::Admin,
                text,
                NotificationCategory::Security,
                None,
            )?;
        }
        Ok(outcome)
    }

    /// Remaining lockout seconds, resetting the entry lazily once the
    /// deadline has passed.
    fn locked_remaining(
        &self,
        member_id: MemberId,
    ) -> Option<u64> {
        let mut entry = self.entries.get_mut(&member_id)?;
        let until = entry.locked_until?;
        let now = Instant::now();
        if until <= now {
            *entry = LockoutEntry::default();
            return None;
        }
        Some(until.saturating_duration_since(now).as_secs().max(1))
    }
}
