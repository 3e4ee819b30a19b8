//! Seams to the outbound delivery world. The chat transport and the address
//! directory are capabilities injected by the collaborating layer; the
//! engine never talks to a concrete messenger API.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::info;

use super::ActionButton;
use crate::MemberId;
use crate::Result;
use crate::SledCirculationStore;

/// Outbound chat-delivery channel, addressed by recipient handle.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send<'a>(
        &self,
        recipient: &str,
        text: &str,
        button: Option<&'a ActionButton>,
    ) -> Result<()>;
}

/// Resolves a member to their linked delivery addresses. A `None` handle is
/// the not-yet-linked case: terminal for a job, never retried.
#[cfg_attr(test, automock)]
pub trait DeliveryDirectory: Send + Sync {
    fn chat_handle(
        &self,
        member_id: MemberId,
    ) -> Result<Option<String>>;

    fn email(
        &self,
        member_id: MemberId,
    ) -> Result<Option<String>>;
}

impl DeliveryDirectory for SledCirculationStore {
    fn chat_handle(
        &self,
        member_id: MemberId,
    ) -> Result<Option<String>> {
        Ok(self.member(member_id)?.and_then(|m| m.chat_handle))
    }

    fn email(
        &self,
        member_id: MemberId,
    ) -> Result<Option<String>> {
        Ok(self.member(member_id)?.and_then(|m| m.email))
    }
}

/// Development transport: deliveries land in the log stream only. The
/// production chat layer injects its own implementation.
#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait]
impl Transport for LoggingTransport {
    async fn send<'a>(
        &self,
        recipient: &str,
        text: &str,
        button: Option<&'a ActionButton>,
    ) -> Result<()> {
        info!(recipient, ?button, "delivering: {text}");
        Ok(())
    }
}
