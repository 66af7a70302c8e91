//! Per-transaction state held by the version manager.

use std::collections::HashSet;
use std::fmt;

use crate::common::{ConflictKind, Tid, SUPER_TID};

/// How much of other transactions' work a transaction may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Sees every committed version as of each read.
    #[default]
    ReadCommitted = 0,
    /// Sees only versions committed before it began.
    RepeatableRead = 1,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationLevel::ReadCommitted => write!(f, "read committed"),
            IsolationLevel::RepeatableRead => write!(f, "repeatable read"),
        }
    }
}

/// An active transaction's context.
#[derive(Debug)]
pub struct Transaction {
    tid: Tid,
    level: IsolationLevel,
    /// Tids active when this transaction began. Empty under read committed.
    snapshot: HashSet<Tid>,
    /// Set when the transaction was rolled back on its own.
    pub(crate) err: Option<ConflictKind>,
    pub(crate) auto_aborted: bool,
}

impl Transaction {
    /// Open a context. `active` is ignored unless `level` is repeatable read.
    pub fn new(tid: Tid, level: IsolationLevel, active: impl IntoIterator<Item = Tid>) -> Self {
        let snapshot = match level {
            IsolationLevel::ReadCommitted => HashSet::new(),
            IsolationLevel::RepeatableRead => active
                .into_iter()
                .filter(|t| *t != SUPER_TID && *t != tid)
                .collect(),
        };
        Self {
            tid,
            level,
            snapshot,
            err: None,
            auto_aborted: false,
        }
    }

    /// The context of the Super tid.
    pub fn super_transaction() -> Self {
        Self::new(SUPER_TID, IsolationLevel::ReadCommitted, [])
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn level(&self) -> IsolationLevel {
        self.level
    }

    pub fn is_super(&self) -> bool {
        self.tid == SUPER_TID
    }

    /// True if `tid` was active when this transaction began.
    pub fn in_snapshot(&self, tid: Tid) -> bool {
        self.snapshot.contains(&tid)
    }

    /// Why the transaction was rolled back, if it was.
    pub fn conflict(&self) -> Option<ConflictKind> {
        self.err
    }
}
