//! Error types for versadb.

use thiserror::Error;

use crate::common::{ItemId, PageNo, Tid};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Why the version manager rolled a transaction back on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Waiting for the record would close a cycle in the wait-for graph.
    Deadlock,
    /// The record was deleted by a transaction invisible to our snapshot.
    VersionSkip,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::Deadlock => write!(f, "deadlock"),
            ConflictKind::VersionSkip => write!(f, "concurrent update"),
        }
    }
}

/// All possible errors in versadb.
///
/// Capacity errors (`CacheFull`, `DataTooLarge`, `DatabaseBusy`) can be retried
/// by the caller. `Conflict` means the transaction has already been rolled back.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from one of the store files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("{0} not found")]
    PageNotFound(PageNo),

    /// The item id does not point at a well-formed item.
    #[error("invalid item id {0}")]
    InvalidItemId(ItemId),

    /// The reference-counted cache reached its live-object limit.
    #[error("cache is full")]
    CacheFull,

    /// Memory budget gives fewer pages than the page cache needs.
    #[error("memory too small: {pages} pages, need at least {minimum}")]
    MemoryTooSmall { pages: usize, minimum: usize },

    /// Wrapped item does not fit in an empty page.
    #[error("data too large: {size} bytes, page holds at most {max}")]
    DataTooLarge { size: usize, max: usize },

    /// No page with enough free space could be claimed within the retry bound.
    #[error("database busy")]
    DatabaseBusy,

    /// The log file failed its checksum verification.
    #[error("corrupt log file: {0}")]
    CorruptLog(String),

    /// The tid file length disagrees with its counter.
    #[error("corrupt tid file: {0}")]
    CorruptTidFile(String),

    /// The boot file failed its CRC check.
    #[error("corrupt boot file")]
    CorruptBootFile,

    /// Tid was never issued, or is the Super tid where a real one is needed.
    #[error("invalid tid {0}")]
    InvalidTid(Tid),

    /// No active transaction context for this tid.
    #[error("no active transaction {0}")]
    NoSuchTransaction(Tid),

    /// A transaction may wait on at most one key at a time.
    #[error("transaction {tid} is already waiting for a lock")]
    AlreadyWaiting { tid: Tid },

    /// Lock manager found a wait-for cycle.
    #[error("deadlock detected for transaction {tid}")]
    Deadlock { tid: Tid },

    /// The transaction was rolled back automatically.
    #[error("transaction {tid} aborted: {kind}")]
    Conflict { tid: Tid, kind: ConflictKind },

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for errors the caller may retry without reopening the store.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::CacheFull | Error::DatabaseBusy | Error::Conflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageNo::new(42));
        assert_eq!(format!("{}", err), "Page(42) not found");

        let err = Error::Conflict {
            tid: 7,
            kind: ConflictKind::VersionSkip,
        };
        assert_eq!(format!("{}", err), "transaction 7 aborted: concurrent update");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_retryable() {
        assert!(Error::CacheFull.is_retryable());
        assert!(Error::DatabaseBusy.is_retryable());
        assert!(!Error::CorruptBootFile.is_retryable());
    }
}
