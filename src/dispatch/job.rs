use chrono::DateTime;
use chrono::Utc;

use crate::BookId;
use crate::LoanId;
use crate::NotificationCategory;
use crate::NotificationTarget;

/// Interactive button attached to a notification; the chat layer renders it
/// and routes the action string back into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub label: String,
    pub action: String,
}

impl ActionButton {
    pub fn borrow_book(book_id: BookId) -> Self {
        Self {
            label: "Borrow now".to_string(),
            action: format!("borrow:{book_id}"),
        }
    }

    pub fn extend_loan(loan_id: LoanId) -> Self {
        Self {
            label: "Extend loan".to_string(),
            action: format!("extend:{loan_id}"),
        }
    }
}

/// One unit of delivery work, independent of the durable notification row it
/// was created alongside.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub id: String,
    pub target: NotificationTarget,
    pub text: String,
    pub category: NotificationCategory,
    pub button: Option<ActionButton>,
    pub created_at: DateTime<Utc>,
}

impl NotificationJob {
    pub fn new(
        target: NotificationTarget,
        text: String,
        category: NotificationCategory,
        button: Option<ActionButton>,
    ) -> Self {
        Self {
            id: nanoid::nanoid!(),
            target,
            text,
            category,
            button,
            created_at: Utc::now(),
        }
    }
}
