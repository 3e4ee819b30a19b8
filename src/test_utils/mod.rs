//! Shared helpers for unit tests: a temp-dir store, a capturing transport
//! and seed data builders.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::ActionButton;
use crate::BookRecord;
use crate::DispatchConfig;
use crate::DispatchError;
use crate::MemberId;
use crate::MemberRecord;
use crate::NotificationDispatcher;
use crate::NotificationJob;
use crate::Result;
use crate::SledCirculationStore;
use crate::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub text: String,
    pub button: Option<ActionButton>,
}

/// Transport double: records every delivery, optionally failing the first
/// `n` attempts to exercise the retry path.
#[derive(Default)]
pub struct RecordingTransport {
    fail_first: AtomicUsize,
    pub attempts: AtomicUsize,
    pub sent: Mutex<Vec<SentMessage>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub fn sent_to(
        &self,
        recipient: &str,
    ) -> Vec<SentMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send<'a>(
        &self,
        recipient: &str,
        text: &str,
        button: Option<&'a ActionButton>,
    ) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(DispatchError::Transport("injected failure".into()).into());
        }
        self.sent.lock().push(SentMessage {
            recipient: recipient.to_string(),
            text: text.to_string(),
            button: button.cloned(),
        });
        Ok(())
    }
}

pub fn temp_store() -> (TempDir, Arc<SledCirculationStore>) {
    let dir = TempDir::new().expect("create temp dir");
    let store = SledCirculationStore::open(dir.path()).expect("open store");
    (dir, Arc::new(store))
}

pub fn test_dispatcher(
    store: Arc<SledCirculationStore>
) -> (Arc<NotificationDispatcher>, mpsc::UnboundedReceiver<NotificationJob>) {
    let (dispatcher, job_rx) = NotificationDispatcher::new(store, &DispatchConfig::default());
    (Arc::new(dispatcher), job_rx)
}

pub fn seed_member(
    store: &SledCirculationStore,
    id: MemberId,
    status: &str,
    chat_handle: Option<&str>,
) -> MemberRecord {
    let member = MemberRecord {
        id,
        name: format!("member-{id}"),
        status: status.to_string(),
        chat_handle: chat_handle.map(str::to_string),
        email: None,
    };
    store.upsert_member(&member).expect("seed member");
    member
}

pub fn seed_book(
    store: &SledCirculationStore,
    title: &str,
    copies: u32,
) -> BookRecord {
    store.add_book(title, "Test Author", copies).expect("seed book")
}

/// Drains everything currently sitting in the job queue.
pub fn drain_jobs(rx: &mut mpsc::UnboundedReceiver<NotificationJob>) -> Vec<NotificationJob> {
    let mut jobs = Vec::new();
    while let Ok(job) = rx.try_recv() {
        jobs.push(job);
    }
    jobs
}
