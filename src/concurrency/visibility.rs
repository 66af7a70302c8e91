//! Version visibility rules.
//!
//! A version created by `min` and deleted by `max` (0 while live) is visible
//! to a transaction depending on its isolation level. The Super transaction
//! sees every version.

use crate::common::{Result, Tid};
use crate::concurrency::{IsolationLevel, TidManager, Transaction};

/// True if the version `(min, max)` is visible to `tx`.
pub fn is_visible(tm: &TidManager, tx: &Transaction, min: Tid, max: Tid) -> Result<bool> {
    if tx.is_super() {
        return Ok(true);
    }
    match tx.level() {
        IsolationLevel::ReadCommitted => read_committed(tm, tx, min, max),
        IsolationLevel::RepeatableRead => repeatable_read(tm, tx, min, max),
    }
}

/// True if `tx` would skip over a deletion it cannot see. Only repeatable
/// read can skip a version.
pub fn is_version_skip(tm: &TidManager, tx: &Transaction, max: Tid) -> Result<bool> {
    if tx.level() == IsolationLevel::ReadCommitted {
        return Ok(false);
    }
    Ok(tm.is_committed(max)? && (max > tx.tid() || tx.in_snapshot(max)))
}

fn read_committed(tm: &TidManager, tx: &Transaction, min: Tid, max: Tid) -> Result<bool> {
    let tid = tx.tid();
    if min == tid && max == 0 {
        return Ok(true);
    }
    if !tm.is_committed(min)? {
        return Ok(false);
    }
    if max == 0 {
        return Ok(true);
    }
    Ok(max != tid && !tm.is_committed(max)?)
}

fn repeatable_read(tm: &TidManager, tx: &Transaction, min: Tid, max: Tid) -> Result<bool> {
    let tid = tx.tid();
    if min == tid && max == 0 {
        return Ok(true);
    }
    if !(tm.is_committed(min)? && min < tid && !tx.in_snapshot(min)) {
        return Ok(false);
    }
    if max == 0 {
        return Ok(true);
    }
    Ok(max != tid && (!tm.is_committed(max)? || max > tid || tx.in_snapshot(max)))
}
