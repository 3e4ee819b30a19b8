//! Sled-backed record store for the circulation engine.
//!
//! One tree per logical table; values are bincode-encoded records. The
//! borrow/return paths run as multi-tree transactions so the inventory
//! counter and the loan row commit together or not at all — concurrent
//! borrows of the last copy are serialized by sled's conflict retry, not by
//! an application-level lock.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use chrono::DateTime;
use chrono::Utc;
use sled::transaction::ConflictableTransactionError;
use sled::transaction::Transactional;
use tracing::error;
use tracing::info;

use super::decode;
use super::encode;
use crate::constants::ACTIVITY_LOG_TREE;
use crate::constants::BOOKS_TREE;
use crate::constants::LOANS_TREE;
use crate::constants::MEMBERS_TREE;
use crate::constants::MEMBER_COUNTS_TREE;
use crate::constants::META_KEY_HEALTH_PROBE;
use crate::constants::META_TREE;
use crate::constants::NOTIFICATIONS_TREE;
use crate::constants::RATINGS_TREE;
use crate::constants::RESERVATIONS_TREE;
use crate::constants::RESERVATION_INDEX_TREE;
use crate::utils::convert::id_key;
use crate::utils::convert::key_id;
use crate::utils::convert::pair_key;
use crate::utils::convert::triple_key;
use crate::utils::time::millis_of;
use crate::ActivityRecord;
use crate::BookId;
use crate::BookRecord;
use crate::CirculationError;
use crate::Error;
use crate::LoanId;
use crate::LoanRecord;
use crate::MemberId;
use crate::MemberRecord;
use crate::NotificationCategory;
use crate::NotificationRecord;
use crate::NotificationTarget;
use crate::RatingRecord;
use crate::RatingStats;
use crate::ReservationRecord;
use crate::Result;
use crate::StorageError;
use crate::TopRatedEntry;

/// All record trees, in backup order.
const RECORD_TREES: [&str; 10] = [
    BOOKS_TREE,
    LOANS_TREE,
    MEMBERS_TREE,
    MEMBER_COUNTS_TREE,
    RESERVATIONS_TREE,
    RESERVATION_INDEX_TREE,
    RATINGS_TREE,
    ACTIVITY_LOG_TREE,
    NOTIFICATIONS_TREE,
    META_TREE,
];

pub struct SledCirculationStore {
    db: sled::Db,
    books: sled::Tree,
    loans: sled::Tree,
    members: sled::Tree,
    member_counts: sled::Tree,
    reservations: sled::Tree,
    reservation_index: sled::Tree,
    ratings: sled::Tree,
    activity_log: sled::Tree,
    notifications: sled::Tree,
    meta: sled::Tree,
}

impl std::fmt::Debug for SledCirculationStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SledCirculationStore")
            .field("books", &self.books.len())
            .field("loans", &self.loans.len())
            .finish()
    }
}

impl Drop for SledCirculationStore {
    fn drop(&mut self) {
        match self.db.flush() {
            Ok(_) => info!("Successfully flushed circulation store"),
            Err(e) => error!(?e, "Failed to flush circulation store"),
        }
    }
}

fn abort<E: Into<Error>>(e: E) -> ConflictableTransactionError<Error> {
    ConflictableTransactionError::Abort(e.into())
}

impl SledCirculationStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::Config::new().path(path).open()?;
        Ok(Self {
            books: db.open_tree(BOOKS_TREE)?,
            loans: db.open_tree(LOANS_TREE)?,
            members: db.open_tree(MEMBERS_TREE)?,
            member_counts: db.open_tree(MEMBER_COUNTS_TREE)?,
            reservations: db.open_tree(RESERVATIONS_TREE)?,
            reservation_index: db.open_tree(RESERVATION_INDEX_TREE)?,
            ratings: db.open_tree(RATINGS_TREE)?,
            activity_log: db.open_tree(ACTIVITY_LOG_TREE)?,
            notifications: db.open_tree(NOTIFICATIONS_TREE)?,
            meta: db.open_tree(META_TREE)?,
            db,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Books & members

    pub fn book(
        &self,
        book_id: BookId,
    ) -> Result<Option<BookRecord>> {
        match self.books.get(id_key(book_id))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn add_book(
        &self,
        title: &str,
        author: &str,
        total_copies: u32,
    ) -> Result<BookRecord> {
        let book = BookRecord {
            id: self.db.generate_id()?,
            title: title.to_string(),
            author: author.to_string(),
            total_copies,
            available_copies: total_copies,
        };
        self.books.insert(id_key(book.id), encode(&book)?)?;
        Ok(book)
    }

    /// Raises the total and the shelf count together.
    pub fn add_copies(
        &self,
        book_id: BookId,
        copies: u32,
    ) -> Result<BookRecord> {
        let result = self.books.transaction(|books| {
            let raw = books
                .get(id_key(book_id))?
                .ok_or_else(|| abort(CirculationError::BookNotFound(book_id)))?;
            let mut book: BookRecord = decode(&raw).map_err(abort)?;
            book.total_copies += copies;
            book.available_copies += copies;
            books.insert(&id_key(book_id)[..], encode(&book).map_err(abort)?)?;
            Ok(book)
        });
        result.map_err(Error::from)
    }

    pub fn member(
        &self,
        member_id: MemberId,
    ) -> Result<Option<MemberRecord>> {
        match self.members.get(id_key(member_id))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn upsert_member(
        &self,
        member: &MemberRecord,
    ) -> Result<()> {
        self.members.insert(id_key(member.id), encode(member)?)?;
        Ok(())
    }

    pub fn member_ids(&self) -> Result<Vec<MemberId>> {
        let mut ids = Vec::new();
        for entry in self.members.iter() {
            let (key, _) = entry?;
            ids.push(key_id(&key)?);
        }
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Loans

    /// Creates a loan and decrements the shelf count in one transaction.
    /// Aborts with `NoCopiesAvailable` if another borrower took the last
    /// copy since the caller looked, and with `BorrowLimitExceeded` when the
    /// member is at their active-loan ceiling.
    pub fn create_loan(
        &self,
        member_id: MemberId,
        book_id: BookId,
        borrowed_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
        borrow_limit: u32,
    ) -> Result<LoanRecord> {
        let loan_id: LoanId = self.db.generate_id()?;
        let result = (&self.books, &self.loans, &self.member_counts).transaction(
            |(books, loans, counts)| {
                let raw = books
                    .get(id_key(book_id))?
                    .ok_or_else(|| abort(CirculationError::BookNotFound(book_id)))?;
                let mut book: BookRecord = decode(&raw).map_err(abort)?;
                if book.available_copies == 0 {
                    return Err(abort(CirculationError::NoCopiesAvailable(book_id)));
                }

                let active = match counts.get(id_key(member_id))? {
                    Some(raw) => key_id(&raw).map_err(abort)?,
                    None => 0,
                };
                if active >= borrow_limit as u64 {
                    return Err(abort(CirculationError::BorrowLimitExceeded {
                        limit: borrow_limit,
                    }));
                }

                let loan = LoanRecord {
                    id: loan_id,
                    member_id,
                    book_id,
                    borrowed_at,
                    due_at,
                    returned_at: None,
                    extensions: 0,
                };
                book.available_copies -= 1;
                books.insert(&id_key(book_id)[..], encode(&book).map_err(abort)?)?;
                loans.insert(&id_key(loan_id)[..], encode(&loan).map_err(abort)?)?;
                counts.insert(&id_key(member_id)[..], &id_key(active + 1)[..])?;
                Ok(loan)
            },
        );
        result.map_err(Error::from)
    }

    /// Marks the loan returned and restores the shelf count in one
    /// transaction. A second return aborts with `AlreadyReturned` so the
    /// counter is incremented exactly once.
    pub fn complete_return(
        &self,
        loan_id: LoanId,
        book_id: BookId,
        returned_at: DateTime<Utc>,
    ) -> Result<LoanRecord> {
        let result = (&self.books, &self.loans, &self.member_counts).transaction(
            |(books, loans, counts)| {
                let raw = loans
                    .get(id_key(loan_id))?
                    .ok_or_else(|| abort(CirculationError::LoanNotFound(loan_id)))?;
                let mut loan: LoanRecord = decode(&raw).map_err(abort)?;
                if loan.book_id != book_id {
                    return Err(abort(CirculationError::LoanNotFound(loan_id)));
                }
                if loan.returned_at.is_some() {
                    return Err(abort(CirculationError::AlreadyReturned(loan_id)));
                }

                let raw = books
                    .get(id_key(book_id))?
                    .ok_or_else(|| abort(CirculationError::BookNotFound(book_id)))?;
                let mut book: BookRecord = decode(&raw).map_err(abort)?;
                if book.available_copies >= book.total_copies {
                    return Err(abort(StorageError::DataCorruption {
                        location: format!("book {book_id} shelf count above total on return"),
                    }));
                }

                loan.returned_at = Some(returned_at);
                book.available_copies += 1;
                let active = match counts.get(id_key(loan.member_id))? {
                    Some(raw) => key_id(&raw).map_err(abort)?,
                    None => 0,
                };
                books.insert(&id_key(book_id)[..], encode(&book).map_err(abort)?)?;
                loans.insert(&id_key(loan_id)[..], encode(&loan).map_err(abort)?)?;
                counts.insert(
                    &id_key(loan.member_id)[..],
                    &id_key(active.saturating_sub(1))[..],
                )?;
                Ok(loan)
            },
        );
        result.map_err(Error::from)
    }

    /// Advances the due date by `extension`, once per loan. Returns `None`
    /// when the extension cap is already spent; nothing is mutated then.
    pub fn extend_loan(
        &self,
        loan_id: LoanId,
        extension: chrono::Duration,
        max_extensions: u32,
    ) -> Result<Option<LoanRecord>> {
        let result = self.loans.transaction(|loans| {
            let raw = loans
                .get(id_key(loan_id))?
                .ok_or_else(|| abort(CirculationError::LoanNotFound(loan_id)))?;
            let mut loan: LoanRecord = decode(&raw).map_err(abort)?;
            if loan.returned_at.is_some() {
                return Err(abort(CirculationError::AlreadyReturned(loan_id)));
            }
            if loan.extensions >= max_extensions {
                return Ok(None);
            }
            loan.due_at += extension;
            loan.extensions += 1;
            loans.insert(&id_key(loan_id)[..], encode(&loan).map_err(abort)?)?;
            Ok(Some(loan))
        });
        result.map_err(Error::from)
    }

    pub fn loan(
        &self,
        loan_id: LoanId,
    ) -> Result<Option<LoanRecord>> {
        match self.loans.get(id_key(loan_id))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn active_loan_count(
        &self,
        member_id: MemberId,
    ) -> Result<u64> {
        match self.member_counts.get(id_key(member_id))? {
            Some(raw) => key_id(&raw),
            None => Ok(0),
        }
    }

    pub fn loans_for_member(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<LoanRecord>> {
        let mut loans = Vec::new();
        for entry in self.loans.iter() {
            let (_, raw) = entry?;
            let loan: LoanRecord = decode(&raw)?;
            if loan.member_id == member_id {
                loans.push(loan);
            }
        }
        Ok(loans)
    }

    /// Every loan with no return date, across all members.
    pub fn active_loans(&self) -> Result<Vec<LoanRecord>> {
        let mut loans = Vec::new();
        for entry in self.loans.iter() {
            let (_, raw) = entry?;
            let loan: LoanRecord = decode(&raw)?;
            if loan.is_active() {
                loans.push(loan);
            }
        }
        Ok(loans)
    }

    // ------------------------------------------------------------------
    // Reservations

    /// Inserts a reservation keyed by (book, creation-millis, member) so a
    /// prefix scan per book yields FIFO order. The index tree enforces
    /// uniqueness per (member, book) while unresolved.
    pub fn create_reservation(
        &self,
        member_id: MemberId,
        book_id: BookId,
        created_at: DateTime<Utc>,
    ) -> Result<ReservationRecord> {
        let record = ReservationRecord {
            member_id,
            book_id,
            created_at,
            notified: false,
        };
        let primary_key = triple_key(book_id, millis_of(&created_at), member_id);
        let index_key = pair_key(book_id, member_id);
        let encoded = encode(&record)?;

        let result = (&self.reservations, &self.reservation_index).transaction(
            move |(reservations, index)| {
                if index.get(index_key)?.is_some() {
                    return Err(abort(CirculationError::AlreadyReserved { member_id, book_id }));
                }
                reservations.insert(&primary_key[..], encoded.clone())?;
                index.insert(&index_key[..], &primary_key[..])?;
                Ok(())
            },
        );
        result.map_err(Error::from)?;
        Ok(record)
    }

    /// Pops the oldest un-notified reservation for the book: marks it
    /// notified and releases the uniqueness slot, keeping the row for audit.
    pub fn pop_oldest_reservation(
        &self,
        book_id: BookId,
    ) -> Result<Option<ReservationRecord>> {
        for entry in self.reservations.scan_prefix(id_key(book_id)) {
            let (key, raw) = entry?;
            let record: ReservationRecord = decode(&raw)?;
            if record.notified {
                continue;
            }

            let mut notified = record.clone();
            notified.notified = true;
            let encoded = encode(&notified)?;
            let key = key.to_vec();
            let index_key = pair_key(book_id, record.member_id);
            let result = (&self.reservations, &self.reservation_index).transaction(
                move |(reservations, index)| {
                    reservations.insert(key.clone(), encoded.clone())?;
                    index.remove(&index_key[..])?;
                    Ok(())
                },
            );
            result.map_err(Error::from)?;
            return Ok(Some(notified));
        }
        Ok(None)
    }

    pub fn reservations_for_book(
        &self,
        book_id: BookId,
    ) -> Result<Vec<ReservationRecord>> {
        let mut records = Vec::new();
        for entry in self.reservations.scan_prefix(id_key(book_id)) {
            let (_, raw) = entry?;
            records.push(decode(&raw)?);
        }
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Ratings

    /// Upsert; returns true when the rating was newly created.
    pub fn upsert_rating(
        &self,
        member_id: MemberId,
        book_id: BookId,
        value: u8,
        rated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let record = RatingRecord {
            member_id,
            book_id,
            value,
            rated_at,
        };
        let prior = self
            .ratings
            .insert(pair_key(member_id, book_id), encode(&record)?)?;
        Ok(prior.is_none())
    }

    pub fn rating(
        &self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<Option<RatingRecord>> {
        match self.ratings.get(pair_key(member_id, book_id))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn top_rated(
        &self,
        limit: usize,
    ) -> Result<Vec<TopRatedEntry>> {
        let mut sums: HashMap<BookId, (u64, u64)> = HashMap::new();
        for entry in self.ratings.iter() {
            let (_, raw) = entry?;
            let rating: RatingRecord = decode(&raw)?;
            let slot = sums.entry(rating.book_id).or_insert((0, 0));
            slot.0 += rating.value as u64;
            slot.1 += 1;
        }

        let mut entries = Vec::with_capacity(sums.len());
        for (book_id, (sum, count)) in sums {
            let title = self
                .book(book_id)?
                .map(|b| b.title)
                .unwrap_or_else(|| "(removed)".to_string());
            entries.push(TopRatedEntry {
                book_id,
                title,
                mean: sum as f64 / count as f64,
                ratings: count,
            });
        }
        // Mean descending, stable by book id on ties.
        entries.sort_by(|a, b| {
            b.mean
                .partial_cmp(&a.mean)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.book_id.cmp(&b.book_id))
        });
        entries.truncate(limit);
        Ok(entries)
    }

    pub fn rating_stats(&self) -> Result<RatingStats> {
        let mut total = 0u64;
        let mut sum = 0u64;
        let mut histogram = [0u64; 5];
        let mut books = HashSet::new();
        let mut raters = HashSet::new();
        for entry in self.ratings.iter() {
            let (_, raw) = entry?;
            let rating: RatingRecord = decode(&raw)?;
            total += 1;
            sum += rating.value as u64;
            if (1..=5).contains(&rating.value) {
                histogram[(rating.value - 1) as usize] += 1;
            }
            books.insert(rating.book_id);
            raters.insert(rating.member_id);
        }
        Ok(RatingStats {
            total,
            distinct_books: books.len() as u64,
            distinct_raters: raters.len() as u64,
            mean: if total == 0 { 0.0 } else { sum as f64 / total as f64 },
            histogram,
        })
    }

    // ------------------------------------------------------------------
    // Activity log & notifications

    pub fn append_activity(
        &self,
        member_id: Option<MemberId>,
        action: &str,
        detail: String,
    ) -> Result<()> {
        let record = ActivityRecord {
            member_id,
            action: action.to_string(),
            detail,
            at: Utc::now(),
        };
        self.activity_log
            .insert(id_key(self.db.generate_id()?), encode(&record)?)?;
        Ok(())
    }

    pub fn activity_entries(&self) -> Result<Vec<ActivityRecord>> {
        let mut records = Vec::new();
        for entry in self.activity_log.iter() {
            let (_, raw) = entry?;
            records.push(decode(&raw)?);
        }
        Ok(records)
    }

    pub fn append_notification(
        &self,
        target: NotificationTarget,
        text: &str,
        category: NotificationCategory,
    ) -> Result<NotificationRecord> {
        let record = NotificationRecord {
            id: self.db.generate_id()?,
            target,
            text: text.to_string(),
            category,
            read: false,
            created_at: Utc::now(),
        };
        self.notifications
            .insert(id_key(record.id), encode(&record)?)?;
        Ok(record)
    }

    pub fn notifications_for_member(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<NotificationRecord>> {
        let mut records = Vec::new();
        for entry in self.notifications.iter() {
            let (_, raw) = entry?;
            let record: NotificationRecord = decode(&raw)?;
            if record.target == NotificationTarget::Member(member_id) {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn admin_notifications(&self) -> Result<Vec<NotificationRecord>> {
        let mut records = Vec::new();
        for entry in self.notifications.iter() {
            let (_, raw) = entry?;
            let record: NotificationRecord = decode(&raw)?;
            if record.target == NotificationTarget::Admin {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn mark_notification_read(
        &self,
        notification_id: u64,
    ) -> Result<()> {
        let result = self.notifications.transaction(|notifications| {
            let raw = notifications
                .get(id_key(notification_id))?
                .ok_or_else(|| {
                    abort(StorageError::DbError(format!(
                        "notification {notification_id} not found"
                    )))
                })?;
            let mut record: NotificationRecord = decode(&raw).map_err(abort)?;
            record.read = true;
            notifications.insert(&id_key(notification_id)[..], encode(&record).map_err(abort)?)?;
            Ok(())
        });
        result.map_err(Error::from)
    }

    // ------------------------------------------------------------------
    // Health & backup

    /// Round-trips a timestamp through the meta tree.
    pub fn health_probe(&self) -> Result<()> {
        let stamp = id_key(millis_of(&Utc::now()));
        self.meta.insert(META_KEY_HEALTH_PROBE, &stamp[..])?;
        match self.meta.get(META_KEY_HEALTH_PROBE)? {
            Some(raw) if raw.as_ref() == stamp => Ok(()),
            _ => Err(StorageError::DbError("health probe readback mismatch".into()).into()),
        }
    }

    /// Full dump of every record tree, in a stable order.
    pub fn export_trees(&self) -> Result<Vec<(String, Vec<(Vec<u8>, Vec<u8>)>)>> {
        let mut dump = Vec::with_capacity(RECORD_TREES.len());
        for name in RECORD_TREES {
            let tree = self.db.open_tree(name)?;
            let mut rows = Vec::with_capacity(tree.len());
            for entry in tree.iter() {
                let (key, value) = entry?;
                rows.push((key.to_vec(), value.to_vec()));
            }
            dump.push((name.to_string(), rows));
        }
        Ok(dump)
    }

    /// Loads a dump produced by [`export_trees`](Self::export_trees) into
    /// this store. Intended for restoring into a freshly opened database.
    pub fn import_trees(
        &self,
        dump: Vec<(String, Vec<(Vec<u8>, Vec<u8>)>)>,
    ) -> Result<()> {
        for (name, rows) in dump {
            let tree = self.db.open_tree(name.as_str())?;
            for (key, value) in rows {
                tree.insert(key, value)?;
            }
        }
        self.flush()
    }
}
