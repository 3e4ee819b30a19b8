//! Verification-code delivery with a defined fallback order.
//!
//! The engine does not branch on contact-string shape; each way of reaching
//! a member is a [`VerificationChannel`] capability and the router walks the
//! configured chain until one succeeds.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::info;
use tracing::warn;

use super::DeliveryDirectory;
use super::Transport;
use crate::config::BackoffPolicy;
use crate::utils::retry::retry_with_timeout;
use crate::DispatchError;
use crate::MemberId;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VerificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send_code(
        &self,
        member_id: MemberId,
        code: &str,
    ) -> Result<()>;
}

/// SMTP relay seam; the concrete mailer lives in the collaborating layer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<()>;
}

pub struct ChatChannel {
    transport: Arc<dyn Transport>,
    directory: Arc<dyn DeliveryDirectory>,
}

impl ChatChannel {
    pub fn new(
        transport: Arc<dyn Transport>,
        directory: Arc<dyn DeliveryDirectory>,
    ) -> Self {
        Self { transport, directory }
    }
}

#[async_trait]
impl VerificationChannel for ChatChannel {
    fn name(&self) -> &'static str {
        "chat"
    }

    async fn send_code(
        &self,
        member_id: MemberId,
        code: &str,
    ) -> Result<()> {
        let handle = self
            .directory
            .chat_handle(member_id)?
            .ok_or(DispatchError::RecipientNotLinked { member_id })?;
        self.transport
            .send(&handle, &format!("Your verification code: {code}"), None)
            .await
    }
}

pub struct EmailChannel {
    mailer: Arc<dyn Mailer>,
    directory: Arc<dyn DeliveryDirectory>,
}

impl EmailChannel {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        directory: Arc<dyn DeliveryDirectory>,
    ) -> Self {
        Self { mailer, directory }
    }
}

#[async_trait]
impl VerificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send_code(
        &self,
        member_id: MemberId,
        code: &str,
    ) -> Result<()> {
        let address = self
            .directory
            .email(member_id)?
            .ok_or(DispatchError::RecipientNotLinked { member_id })?;
        self.mailer
            .send_email(
                &address,
                "Your verification code",
                &format!("Your verification code: {code}"),
            )
            .await
    }
}

/// Tries each channel in order; the first success wins. Transient failures
/// are retried per the verification backoff policy before falling back to
/// the next channel; an unlinked address falls through immediately.
pub struct VerificationRouter {
    channels: Vec<Arc<dyn VerificationChannel>>,
    policy: BackoffPolicy,
}

impl VerificationRouter {
    pub fn new(
        channels: Vec<Arc<dyn VerificationChannel>>,
        policy: BackoffPolicy,
    ) -> Self {
        Self { channels, policy }
    }

    pub async fn send_code(
        &self,
        member_id: MemberId,
        code: &str,
    ) -> Result<()> {
        let mut failed = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let attempt = || channel.send_code(member_id, code);
            match retry_with_timeout(attempt, &self.policy).await {
                Ok(()) => {
                    info!(member_id, channel = channel.name(), "verification code sent");
                    return Ok(());
                }
                Err(e) => {
                    warn!(member_id, channel = channel.name(), ?e, "verification channel failed");
                    failed.push(channel.name());
                }
            }
        }
        Err(DispatchError::ChannelExhausted(failed.join(", ")).into())
    }
}
