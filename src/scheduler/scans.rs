//! Due-date scans over the loan table.
//!
//! Each scan walks every active loan once; re-entrancy is excluded by the
//! scheduler's cadence, not by locking, so a scan must be safe to repeat.

use std::sync::Arc;

use chrono::Duration;
use chrono::Utc;
use tracing::error;
use tracing::info;

use crate::ActionButton;
use crate::NotificationCategory;
use crate::NotificationDispatcher;
use crate::NotificationTarget;
use crate::Result;
use crate::SledCirculationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Active loans inspected
    pub scanned: usize,
    /// Loans inside the scan's window
    pub matched: usize,
    /// Reminders actually enqueued
    pub notified: usize,
}

impl std::fmt::Display for ScanSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "scanned {} active loans, matched {}, notified {}",
            self.scanned, self.matched, self.notified
        )
    }
}

pub struct LoanScanner {
    store: Arc<SledCirculationStore>,
    dispatcher: Arc<NotificationDispatcher>,
    lookahead: Duration,
}

impl LoanScanner {
    pub fn new(
        store: Arc<SledCirculationStore>,
        dispatcher: Arc<NotificationDispatcher>,
        lookahead_days: i64,
    ) -> Self {
        Self {
            store,
            dispatcher,
            lookahead: Duration::days(lookahead_days),
        }
    }

    fn book_title(
        &self,
        book_id: u64,
    ) -> String {
        match self.store.book(book_id) {
            Ok(Some(book)) => book.title,
            _ => format!("book {book_id}"),
        }
    }

    /// One reminder to the member and one audit line to the admin channel
    /// per overdue loan.
    pub fn run_overdue_scan(&self) -> Result<ScanSummary> {
        let now = Utc::now();
        let loans = self.store.active_loans()?;
        let mut summary = ScanSummary {
            scanned: loans.len(),
            matched: 0,
            notified: 0,
        };

        for loan in loans {
            if !loan.is_overdue(now) {
                continue;
            }
            summary.matched += 1;
            let title = self.book_title(loan.book_id);
            let due = loan.due_at.format("%Y-%m-%d");

            match self.dispatcher.enqueue(
                NotificationTarget::Member(loan.member_id),
                format!("\"{title}\" was due on {due}. Please return it."),
                NotificationCategory::Overdue,
                None,
            ) {
                Ok(_) => summary.notified += 1,
                Err(e) => error!(loan_id = loan.id, ?e, "failed to enqueue overdue reminder"),
            }
            if let Err(e) = self.dispatcher.enqueue(
                NotificationTarget::Admin,
                format!(
                    "Overdue: loan {} (member {}, book {}) was due {}",
                    loan.id, loan.member_id, loan.book_id, due
                ),
                NotificationCategory::System,
                None,
            ) {
                error!(loan_id = loan.id, ?e, "failed to enqueue overdue audit line");
            }
        }

        info!("overdue scan: {summary}");
        Ok(summary)
    }

    /// Reminders with an extend button for loans entering the lookahead
    /// window; loans already overdue belong to the overdue scan.
    pub fn run_due_soon_scan(&self) -> Result<ScanSummary> {
        let now = Utc::now();
        let horizon = now + self.lookahead;
        let loans = self.store.active_loans()?;
        let mut summary = ScanSummary {
            scanned: loans.len(),
            matched: 0,
            notified: 0,
        };

        for loan in loans {
            if loan.due_at <= now || loan.due_at > horizon {
                continue;
            }
            summary.matched += 1;
            let title = self.book_title(loan.book_id);

            match self.dispatcher.enqueue(
                NotificationTarget::Member(loan.member_id),
                format!(
                    "\"{title}\" is due on {}. Need more time?",
                    loan.due_at.format("%Y-%m-%d")
                ),
                NotificationCategory::DueSoon,
                Some(ActionButton::extend_loan(loan.id)),
            ) {
                Ok(_) => summary.notified += 1,
                Err(e) => error!(loan_id = loan.id, ?e, "failed to enqueue due-soon reminder"),
            }
        }

        info!("due-soon scan: {summary}");
        Ok(summary)
    }
}
