//! Circulation Engine Error Hierarchy
//!
//! Defines the error types for the circulation backend, categorized by
//! subsystem (storage, circulation rules, notification dispatch) and
//! operational concerns.

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (storage, serialization, background tasks)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Circulation rule violations and missing entities
    #[error(transparent)]
    Circulation(#[from] CirculationError),

    /// Notification delivery failures
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Retryable errors are transient delivery failures; everything else is
    /// terminal for the current attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Dispatch(DispatchError::Transport(_)) | Error::Dispatch(DispatchError::Timeout(_))
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Storage layer
    #[error("Storage operation failed")]
    Storage(#[from] StorageError),

    // Serialization
    #[error("Serialization error")]
    Serialization(#[from] SerializationError),

    #[error("Background task failed: {0}")]
    Task(#[from] JoinError),

    /// Unexpected internal failure already reported to the admin channel;
    /// callers surface a generic message only.
    #[error("General server error: {0}")]
    GeneralServer(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures during backup/restore operations
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Embedded database errors
    #[error("Embedded database error: {0}")]
    DbError(String),

    /// Inventory counters out of agreement with loan rows
    #[error("Data corruption detected at {location}")]
    DataCorruption { location: String },

    /// Backup creation/restore failures
    #[error("Backup operation failed: {0}")]
    Backup(String),

    /// Error type for key conversion operations
    #[error("Key convert failed")]
    Convert(#[from] ConvertError),
}

// Serialization is classified separately (record values and backup archives)
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("Bincode serialization failed: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Error type for key conversion operations
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The raw key length does not match the expected fixed-width layout.
    #[error("invalid byte length: expected {expected} bytes, received {actual} bytes")]
    InvalidLength { expected: usize, actual: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum CirculationError {
    #[error("Book {0} not found")]
    BookNotFound(u64),

    #[error("Loan {0} not found")]
    LoanNotFound(u64),

    #[error("Member {0} not found")]
    MemberNotFound(u64),

    /// No copies on the shelf; the caller decides whether to reserve.
    #[error("No copies of book {0} are currently available")]
    NoCopiesAvailable(u64),

    /// Second return of the same loan; inventory is left untouched.
    #[error("Loan {0} has already been returned")]
    AlreadyReturned(u64),

    /// Duplicate reservation for the same (member, book) pair
    #[error("Member {member_id} already holds a reservation for book {book_id}")]
    AlreadyReserved { member_id: u64, book_id: u64 },

    /// Borrow cap reached; user-correctable, not a bug
    #[error("Borrow limit of {limit} active loans reached")]
    BorrowLimitExceeded { limit: u32 },

    #[error("Rating value {0} is outside the allowed range 1..=5")]
    InvalidRating(u8),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Transport send failure (retryable)
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Transport call exceeded its bounded wait (retryable)
    #[error("Transport timeout after {0:?}")]
    Timeout(Duration),

    /// Member has no linked delivery address; terminal, never retried
    #[error("Member {member_id} has no linked delivery address")]
    RecipientNotLinked { member_id: u64 },

    /// Retry policy exhaustion; the job is abandoned and reported
    #[error("Job {job_id} abandoned after {attempts} attempts")]
    RetryExhausted { job_id: String, attempts: usize },

    /// The worker pool is gone; submission side is shutting down
    #[error("Notification queue is closed")]
    QueueClosed,

    /// Every verification channel in the fallback chain failed
    #[error("All verification channels failed: {0}")]
    ChannelExhausted(String),
}

// ============== Conversion Implementations ============== //
impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<SerializationError> for Error {
    fn from(e: SerializationError) -> Self {
        Error::System(SystemError::Serialization(e))
    }
}

impl From<ConvertError> for Error {
    fn from(e: ConvertError) -> Self {
        Error::System(SystemError::Storage(StorageError::Convert(e)))
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        SerializationError::Bincode(err).into()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err).into()
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        StorageError::DbError(err.to_string()).into()
    }
}

impl From<sled::transaction::TransactionError<Error>> for Error {
    fn from(err: sled::transaction::TransactionError<Error>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => StorageError::DbError(e.to_string()).into(),
        }
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        SystemError::Task(err).into()
    }
}
