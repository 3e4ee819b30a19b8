//! Durable record types persisted in the sled trees.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

pub type MemberId = u64;
pub type BookId = u64;
pub type LoanId = u64;

/// Inventory row. Invariant: `available_copies + active loans == total_copies`
/// at all times; mutated only inside store transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub total_copies: u32,
    pub available_copies: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: LoanId,
    pub member_id: MemberId,
    pub book_id: BookId,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    /// None while the loan is active
    pub returned_at: Option<DateTime<Utc>>,
    pub extensions: u32,
}

impl LoanRecord {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn is_overdue(
        &self,
        now: DateTime<Utc>,
    ) -> bool {
        self.is_active() && self.due_at < now
    }
}

/// Minimal member registry row. Registration dialogue lives in the chat
/// layer; the engine only needs the status for the borrow limit table and
/// the linked delivery addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    pub name: String,
    pub status: String,
    /// Chat transport handle; None until the member links their account
    pub chat_handle: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub member_id: MemberId,
    pub book_id: BookId,
    pub created_at: DateTime<Utc>,
    /// Set when the member was offered a freed copy; the row stays for audit
    pub notified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub member_id: MemberId,
    pub book_id: BookId,
    /// 1..=5 stars
    pub value: u8,
    pub rated_at: DateTime<Utc>,
}

/// Append-only audit row, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// None once the member is removed
    pub member_id: Option<MemberId>,
    pub action: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationTarget {
    Member(MemberId),
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationCategory {
    LoanConfirmation,
    ReservationAvailable,
    DueSoon,
    Overdue,
    Broadcast,
    Security,
    Verification,
    System,
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let tag = match self {
            NotificationCategory::LoanConfirmation => "loan_confirmation",
            NotificationCategory::ReservationAvailable => "reservation_available",
            NotificationCategory::DueSoon => "due_soon",
            NotificationCategory::Overdue => "overdue",
            NotificationCategory::Broadcast => "broadcast",
            NotificationCategory::Security => "security",
            NotificationCategory::Verification => "verification",
            NotificationCategory::System => "system",
        };
        write!(f, "{tag}")
    }
}

/// The durable truth for every dispatched notification; transport delivery
/// is best-effort on top of this row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: u64,
    pub target: NotificationTarget,
    pub text: String,
    pub category: NotificationCategory,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// One row of a member's borrow history: the loan joined with the book title
/// and the member's rating for that book, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub loan: LoanRecord,
    pub book_title: String,
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopRatedEntry {
    pub book_id: BookId,
    pub title: String,
    pub mean: f64,
    pub ratings: u64,
}

/// Aggregates for the statistics surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingStats {
    pub total: u64,
    pub distinct_books: u64,
    pub distinct_raters: u64,
    pub mean: f64,
    /// index 0 holds the count of 1-star ratings
    pub histogram: [u64; 5],
}
