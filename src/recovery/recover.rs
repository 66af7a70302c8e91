//! Crash recovery: redo finished transactions, undo unfinished ones.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::buffer::PageStore;
use crate::common::{PageNo, Result, Tid};
use crate::concurrency::TidManager;
use crate::data::set_raw_invalid;
use crate::recovery::{LogRecord, Wal};

/// What a recovery pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Records replayed for transactions that had finished.
    pub redone: usize,
    /// Records rolled back for transactions that were still active.
    pub undone: usize,
    /// Tids that were still active, now marked aborted.
    pub aborted: Vec<Tid>,
}

/// Bring the page file back in line with the log after an unclean shutdown.
///
/// 1. Truncate the page file to the highest page the log references.
/// 2. Redo, in log order, every record of a tid that is not active.
/// 3. Undo, in reverse log order, every record of a tid still active, then
///    mark every tid still active aborted, logged or not.
pub fn recover(pages: &PageStore, wal: &Wal, tm: &TidManager) -> Result<RecoveryReport> {
    let records = wal
        .records()?
        .iter()
        .map(|buf| LogRecord::decode(buf))
        .collect::<Result<Vec<_>>>()?;
    info!(records = records.len(), "recovery started");

    let max_page = records
        .iter()
        .map(|r| r.item_id().page_no())
        .max()
        .unwrap_or(PageNo::ONE)
        .max(PageNo::ONE);
    pages.truncate(max_page)?;

    let mut report = RecoveryReport::default();

    for record in &records {
        if !tm.is_active(record.tid())? {
            redo(pages, record)?;
            report.redone += 1;
        }
    }

    let mut active = BTreeSet::new();
    for record in records.iter().rev() {
        if tm.is_active(record.tid())? {
            undo(pages, record)?;
            active.insert(record.tid());
            report.undone += 1;
        }
    }

    // Tids with no surviving records can still be active.
    for tid in 1..=tm.issued() {
        if tm.is_active(tid)? {
            active.insert(tid);
        }
    }
    for &tid in &active {
        tm.abort(tid)?;
    }
    report.aborted = active.into_iter().collect();

    info!(
        redone = report.redone,
        undone = report.undone,
        aborted = report.aborted.len(),
        "recovery finished"
    );
    Ok(report)
}

fn redo(pages: &PageStore, record: &LogRecord) -> Result<()> {
    let id = record.item_id();
    let guard = pages.fetch(id.page_no())?;
    match record {
        LogRecord::Insert { raw, .. } => guard.write().recover_insert(raw, id.offset()),
        LogRecord::Update { new, .. } => guard.write().recover_update(new, id.offset()),
    }
    debug!(tid = record.tid(), item = %id, "redo");
    guard.release()
}

fn undo(pages: &PageStore, record: &LogRecord) -> Result<()> {
    let id = record.item_id();
    let guard = pages.fetch(id.page_no())?;
    match record {
        LogRecord::Insert { raw, .. } => {
            let mut raw = raw.clone();
            set_raw_invalid(&mut raw);
            guard.write().recover_insert(&raw, id.offset());
        }
        LogRecord::Update { old, .. } => guard.write().recover_update(old, id.offset()),
    }
    debug!(tid = record.tid(), item = %id, "undo");
    guard.release()
}
