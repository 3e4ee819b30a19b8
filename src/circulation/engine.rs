//! The circulation engine: borrow, reserve, return, extend and rate,
//! against the sled record store, with notifications enqueued on state
//! transitions.
//!
//! Every operation is safe under concurrent callers: the inventory counter
//! and the loan row commit in one store transaction, so two borrows racing
//! for the last copy cannot both succeed.

use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tracing::error;
use tracing::info;

use super::CirculationPolicy;
use crate::ActionButton;
use crate::BookId;
use crate::BookRecord;
use crate::CirculationError;
use crate::Error;
use crate::HistoryEntry;
use crate::LoanId;
use crate::MemberId;
use crate::NotificationCategory;
use crate::NotificationDispatcher;
use crate::NotificationTarget;
use crate::RatingStats;
use crate::Result;
use crate::SledCirculationStore;
use crate::SystemError;
use crate::TopRatedEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowOutcome {
    Borrowed { due_date: DateTime<Utc> },
    /// No copies on the shelf; the caller asks the member whether to
    /// reserve. Inventory is untouched.
    NeedsReservationDecision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendOutcome {
    Extended { new_due_date: DateTime<Utc> },
    /// Non-fatal: the extension cap is spent and the due date is unchanged.
    LimitReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingOutcome {
    Created,
    Updated,
}

pub struct CirculationEngine {
    store: Arc<SledCirculationStore>,
    dispatcher: Arc<NotificationDispatcher>,
    policy: CirculationPolicy,
}

impl CirculationEngine {
    pub fn new(
        store: Arc<SledCirculationStore>,
        dispatcher: Arc<NotificationDispatcher>,
        policy: CirculationPolicy,
    ) -> Self {
        Self {
            store,
            dispatcher,
            policy,
        }
    }

    pub fn store(&self) -> Arc<SledCirculationStore> {
        self.store.clone()
    }

    /// Lends a copy to the member, or reports that a reservation decision is
    /// needed when the shelf is empty.
    pub fn borrow(
        &self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<BorrowOutcome> {
        let member = self
            .store
            .member(member_id)?
            .ok_or(CirculationError::MemberNotFound(member_id))?;
        let book = self
            .store
            .book(book_id)?
            .ok_or(CirculationError::BookNotFound(book_id))?;
        if book.available_copies == 0 {
            return Ok(BorrowOutcome::NeedsReservationDecision);
        }

        let limit = self.policy.borrow_limit(&member.status);
        let now = Utc::now();
        let due = self.policy.due_date(now);
        match self.store.create_loan(member_id, book_id, now, due, limit) {
            Ok(loan) => {
                self.log_activity(
                    Some(member_id),
                    "borrow",
                    format!("loan {} of book {} ({})", loan.id, book_id, book.title),
                );
                self.notify_member(
                    member_id,
                    format!(
                        "You borrowed \"{}\". Due back on {}.",
                        book.title,
                        due.format("%Y-%m-%d")
                    ),
                    NotificationCategory::LoanConfirmation,
                    None,
                );
                info!(member_id, book_id, loan_id = loan.id, "book borrowed");
                Ok(BorrowOutcome::Borrowed { due_date: loan.due_at })
            }
            // Somebody took the last copy since we looked.
            Err(Error::Circulation(CirculationError::NoCopiesAvailable(_))) => {
                Ok(BorrowOutcome::NeedsReservationDecision)
            }
            Err(e @ Error::Circulation(_)) => Err(e),
            Err(e) => Err(self.report_internal("borrow", e)),
        }
    }

    /// Joins the FIFO wait list for the book. Duplicate reservations per
    /// (member, book) are rejected with `AlreadyReserved`.
    pub fn reserve(
        &self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<()> {
        self.store
            .member(member_id)?
            .ok_or(CirculationError::MemberNotFound(member_id))?;
        let book = self
            .store
            .book(book_id)?
            .ok_or(CirculationError::BookNotFound(book_id))?;

        match self.store.create_reservation(member_id, book_id, Utc::now()) {
            Ok(_) => {
                self.log_activity(
                    Some(member_id),
                    "reserve",
                    format!("book {} ({})", book_id, book.title),
                );
                info!(member_id, book_id, "reservation created");
                Ok(())
            }
            Err(e @ Error::Circulation(_)) => Err(e),
            Err(e) => Err(self.report_internal("reserve", e)),
        }
    }

    /// Takes the copy back and offers it to the oldest waiting reservation.
    /// The copy is offered, not granted: nobody auto-borrows on the notified
    /// member's behalf.
    pub fn return_book(
        &self,
        loan_id: LoanId,
        book_id: BookId,
    ) -> Result<()> {
        let loan = match self.store.complete_return(loan_id, book_id, Utc::now()) {
            Ok(loan) => loan,
            Err(e @ Error::Circulation(_)) => return Err(e),
            Err(e) => return Err(self.report_internal("return", e)),
        };
        self.log_activity(
            Some(loan.member_id),
            "return",
            format!("loan {} of book {}", loan_id, book_id),
        );

        // The return is committed; offering the copy to the queue is
        // follow-up work and must not fail the call.
        match self.store.pop_oldest_reservation(book_id) {
            Ok(Some(reservation)) => {
                let title = self
                    .store
                    .book(book_id)
                    .ok()
                    .flatten()
                    .map(|b| b.title)
                    .unwrap_or_else(|| format!("book {book_id}"));
                self.notify_member(
                    reservation.member_id,
                    format!("\"{title}\" is available again. Your reservation is first in line."),
                    NotificationCategory::ReservationAvailable,
                    Some(ActionButton::borrow_book(book_id)),
                );
                info!(
                    member_id = reservation.member_id,
                    book_id, "waiting reservation notified"
                );
            }
            Ok(None) => {}
            Err(e) => error!(book_id, ?e, "failed to inspect the reservation queue"),
        }
        Ok(())
    }

    /// Pushes the due date out by the policy window, at most once per loan.
    pub fn extend(
        &self,
        loan_id: LoanId,
    ) -> Result<ExtendOutcome> {
        let extended = match self.store.extend_loan(
            loan_id,
            self.policy.extension(),
            self.policy.max_extensions(),
        ) {
            Ok(extended) => extended,
            Err(e @ Error::Circulation(_)) => return Err(e),
            Err(e) => return Err(self.report_internal("extend", e)),
        };
        match extended {
            Some(loan) => {
                self.log_activity(
                    Some(loan.member_id),
                    "extend",
                    format!("loan {} now due {}", loan_id, loan.due_at.format("%Y-%m-%d")),
                );
                Ok(ExtendOutcome::Extended {
                    new_due_date: loan.due_at,
                })
            }
            None => Ok(ExtendOutcome::LimitReached),
        }
    }

    /// Upserts the member's rating for the book; a second submission
    /// overwrites the first value.
    pub fn rate(
        &self,
        member_id: MemberId,
        book_id: BookId,
        value: u8,
    ) -> Result<RatingOutcome> {
        if !(1..=5).contains(&value) {
            return Err(CirculationError::InvalidRating(value).into());
        }
        self.store
            .book(book_id)?
            .ok_or(CirculationError::BookNotFound(book_id))?;

        let created = self
            .store
            .upsert_rating(member_id, book_id, value, Utc::now())?;
        self.log_activity(
            Some(member_id),
            "rate",
            format!("book {} rated {}", book_id, value),
        );
        Ok(if created {
            RatingOutcome::Created
        } else {
            RatingOutcome::Updated
        })
    }

    /// All of the member's loans, active and returned, joined with their
    /// rating when present.
    pub fn borrow_history(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<HistoryEntry>> {
        let mut entries = Vec::new();
        for loan in self.store.loans_for_member(member_id)? {
            let book_title = self
                .store
                .book(loan.book_id)?
                .map(|b| b.title)
                .unwrap_or_else(|| "(removed)".to_string());
            let rating = self
                .store
                .rating(member_id, loan.book_id)?
                .map(|r| r.value);
            entries.push(HistoryEntry {
                loan,
                book_title,
                rating,
            });
        }
        Ok(entries)
    }

    pub fn top_rated(
        &self,
        limit: usize,
    ) -> Result<Vec<TopRatedEntry>> {
        self.store.top_rated(limit)
    }

    pub fn rating_stats(&self) -> Result<RatingStats> {
        self.store.rating_stats()
    }

    // ------------------------------------------------------------------
    // Inventory admin

    pub fn add_book(
        &self,
        title: &str,
        author: &str,
        total_copies: u32,
    ) -> Result<BookRecord> {
        let book = self.store.add_book(title, author, total_copies)?;
        self.log_activity(
            None,
            "add_book",
            format!("book {} ({}) with {} copies", book.id, title, total_copies),
        );
        Ok(book)
    }

    pub fn add_copies(
        &self,
        book_id: BookId,
        copies: u32,
    ) -> Result<BookRecord> {
        let book = self.store.add_copies(book_id, copies)?;
        self.log_activity(
            None,
            "add_copies",
            format!("book {} now has {} copies", book_id, book.total_copies),
        );
        Ok(book)
    }

    // ------------------------------------------------------------------

    /// The audit trail must never fail a committed circulation mutation;
    /// append errors are logged and the durable state stands.
    fn log_activity(
        &self,
        member_id: Option<MemberId>,
        action: &str,
        detail: String,
    ) {
        if let Err(e) = self.store.append_activity(member_id, action, detail) {
            error!(action, ?e, "failed to append activity entry");
        }
    }

    /// Notification enqueue must never fail a committed circulation
    /// mutation; submission errors are logged and the durable state stands.
    fn notify_member(
        &self,
        member_id: MemberId,
        text: String,
        category: NotificationCategory,
        button: Option<ActionButton>,
    ) {
        if let Err(e) =
            self.dispatcher
                .enqueue(NotificationTarget::Member(member_id), text, category, button)
        {
            error!(member_id, ?e, "failed to enqueue notification");
        }
    }

    /// Boundary rule for unexpected failures: log with context, report once
    /// to the admin channel, hand the caller a generic retryable message.
    fn report_internal(
        &self,
        operation: &'static str,
        e: Error,
    ) -> Error {
        error!(operation, ?e, "unexpected failure in circulation operation");
        if let Err(report_err) = self.dispatcher.enqueue(
            NotificationTarget::Admin,
            format!("Internal failure in {operation}: {e}"),
            NotificationCategory::System,
            None,
        ) {
            error!(?report_err, "failed to report internal failure to admin channel");
        }
        Error::System(SystemError::GeneralServer(
            "operation failed, please try again later".to_string(),
        ))
    }
}
