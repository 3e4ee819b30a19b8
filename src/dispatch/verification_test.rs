use std::sync::Arc;

use super::transport::MockTransport;
use super::verification::ChatChannel;
use super::verification::EmailChannel;
use super::verification::MockMailer;
use super::verification::MockVerificationChannel;
use super::verification::VerificationChannel;
use super::verification::VerificationRouter;
use crate::config::BackoffPolicy;
use crate::test_utils::temp_store;
use crate::DispatchError;
use crate::Error;
use crate::MemberRecord;

fn member_with_contacts(
    store: &crate::SledCirculationStore,
    chat_handle: Option<&str>,
    email: Option<&str>,
) -> MemberRecord {
    let member = MemberRecord {
        id: 7,
        name: "member-7".to_string(),
        status: "standard".to_string(),
        chat_handle: chat_handle.map(str::to_string),
        email: email.map(str::to_string),
    };
    store.upsert_member(&member).expect("seed member");
    member
}

#[tokio::test]
async fn chat_channel_sends_the_code_to_the_linked_handle() {
    let (_dir, store) = temp_store();
    member_with_contacts(&store, Some("@seven"), None);

    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(|recipient, text, _| recipient == "@seven" && text.contains("123456"))
        .times(1)
        .returning(|_, _, _| Ok(()));

    let channel = ChatChannel::new(Arc::new(transport), store.clone());
    channel.send_code(7, "123456").await.unwrap();
}

#[tokio::test]
async fn chat_channel_fails_for_unlinked_members() {
    let (_dir, store) = temp_store();
    member_with_contacts(&store, None, None);

    let channel = ChatChannel::new(Arc::new(MockTransport::new()), store.clone());
    let err = channel.send_code(7, "123456").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Dispatch(DispatchError::RecipientNotLinked { member_id: 7 })
    ));
}

#[tokio::test]
async fn email_channel_mails_the_code() {
    let (_dir, store) = temp_store();
    member_with_contacts(&store, None, Some("seven@example.org"));

    let mut mailer = MockMailer::new();
    mailer
        .expect_send_email()
        .withf(|to, _, body| to == "seven@example.org" && body.contains("123456"))
        .times(1)
        .returning(|_, _, _| Ok(()));

    let channel = EmailChannel::new(Arc::new(mailer), store.clone());
    channel.send_code(7, "123456").await.unwrap();
}

fn fast_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 1,
        timeout_ms: 100,
        base_delay_ms: 10,
        max_delay_ms: 20,
    }
}

#[tokio::test(start_paused = true)]
async fn router_retries_transient_failures_then_falls_back_in_order() {
    let mut first = MockVerificationChannel::new();
    first.expect_name().return_const("chat");
    // Transient failure: retried once per policy before falling back.
    first
        .expect_send_code()
        .times(2)
        .returning(|_, _| Err(DispatchError::Transport("down".into()).into()));

    let mut second = MockVerificationChannel::new();
    second.expect_name().return_const("email");
    second.expect_send_code().times(1).returning(|_, _| Ok(()));

    let router = VerificationRouter::new(vec![Arc::new(first), Arc::new(second)], fast_policy());
    router.send_code(7, "123456").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn router_skips_retries_for_unlinked_members() {
    let mut first = MockVerificationChannel::new();
    first.expect_name().return_const("chat");
    // Terminal error: exactly one attempt, no retry.
    first
        .expect_send_code()
        .times(1)
        .returning(|member_id, _| Err(DispatchError::RecipientNotLinked { member_id }.into()));

    let mut second = MockVerificationChannel::new();
    second.expect_name().return_const("email");
    second.expect_send_code().times(1).returning(|_, _| Ok(()));

    let router = VerificationRouter::new(vec![Arc::new(first), Arc::new(second)], fast_policy());
    router.send_code(7, "123456").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn router_reports_every_failed_channel() {
    let mut first = MockVerificationChannel::new();
    first.expect_name().return_const("chat");
    first
        .expect_send_code()
        .returning(|_, _| Err(DispatchError::Transport("down".into()).into()));

    let mut second = MockVerificationChannel::new();
    second.expect_name().return_const("email");
    second
        .expect_send_code()
        .returning(|member_id, _| Err(DispatchError::RecipientNotLinked { member_id }.into()));

    let router = VerificationRouter::new(vec![Arc::new(first), Arc::new(second)], fast_policy());
    let err = router.send_code(7, "123456").await.unwrap_err();
    let Error::Dispatch(DispatchError::ChannelExhausted(channels)) = err else {
        panic!("expected channel exhaustion");
    };
    assert!(channels.contains("chat"));
    assert!(channels.contains("email"));
}
