//! Recovery layer - write-ahead logging and crash recovery.
//!
//! - [`Wal`] - Append-only, checksummed log file
//! - [`LogRecord`] - Insert and update records written by the data manager
//! - [`recover`] - Redo/undo pass run after an unclean shutdown

mod log_record;
mod recover;
mod wal;

pub use log_record::LogRecord;
pub use recover::{recover, RecoveryReport};
pub use wal::{checksum, Wal, CHECKSUM_SEED};
