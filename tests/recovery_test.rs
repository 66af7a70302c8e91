//! Crash recovery tests.
//!
//! A "crash" drops the store without calling `close`, so page 1 keeps a
//! mismatched stamp pair and dirty pages may never reach disk.

use std::fs;

use tempfile::tempdir;
use versadb::concurrency::TidManager;
use versadb::{Config, IsolationLevel, Store, LOG_FILE, TID_FILE};

const RC: IsolationLevel = IsolationLevel::ReadCommitted;

fn config(dir: &tempfile::TempDir) -> Config {
    Config {
        path: dir.path().to_path_buf(),
        ..Default::default()
    }
}

#[test]
fn test_committed_kept_uncommitted_dropped() {
    let dir = tempdir().unwrap();
    let (kept, lost, loser);
    {
        let store = Store::create(config(&dir)).unwrap();

        let winner = store.begin(RC).unwrap();
        kept = store.insert(winner, b"committed").unwrap();
        store.commit(winner).unwrap();

        loser = store.begin(RC).unwrap();
        lost = store.insert(loser, b"in flight").unwrap();
        // crash
    }

    let store = Store::open(config(&dir)).unwrap();
    let tid = store.begin(RC).unwrap();
    assert_eq!(store.read(tid, kept).unwrap(), Some(b"committed".to_vec()));
    assert_eq!(store.read(tid, lost).unwrap(), None);
    store.commit(tid).unwrap();
    store.close().unwrap();

    let tm = TidManager::open(dir.path().join(TID_FILE)).unwrap();
    assert!(tm.is_aborted(loser).unwrap());
}

#[test]
fn test_uncommitted_delete_undone() {
    let dir = tempdir().unwrap();
    let id;
    {
        let store = Store::create(config(&dir)).unwrap();
        let setup = store.begin(RC).unwrap();
        id = store.insert(setup, b"survivor").unwrap();
        store.commit(setup).unwrap();

        let deleter = store.begin(RC).unwrap();
        assert!(store.delete(deleter, id).unwrap());
        // crash before the deleter commits
    }

    let store = Store::open(config(&dir)).unwrap();
    let tid = store.begin(RC).unwrap();
    assert_eq!(store.read(tid, id).unwrap(), Some(b"survivor".to_vec()));

    // The record is deletable again.
    assert!(store.delete(tid, id).unwrap());
    store.commit(tid).unwrap();
}

#[test]
fn test_committed_delete_redone() {
    let dir = tempdir().unwrap();
    let id;
    {
        let store = Store::create(config(&dir)).unwrap();
        let setup = store.begin(RC).unwrap();
        id = store.insert(setup, b"doomed").unwrap();
        store.commit(setup).unwrap();

        let deleter = store.begin(RC).unwrap();
        assert!(store.delete(deleter, id).unwrap());
        store.commit(deleter).unwrap();
    }

    let store = Store::open(config(&dir)).unwrap();
    let tid = store.begin(RC).unwrap();
    assert_eq!(store.read(tid, id).unwrap(), None);
}

#[test]
fn test_torn_log_tail() {
    let dir = tempdir().unwrap();
    let (kept, torn);
    {
        let store = Store::create(config(&dir)).unwrap();
        let t1 = store.begin(RC).unwrap();
        kept = store.insert(t1, b"whole").unwrap();
        store.commit(t1).unwrap();

        let t2 = store.begin(RC).unwrap();
        torn = store.insert(t2, b"torn apart").unwrap();
    }

    // Cut the last log record in half.
    let log_path = dir.path().join(LOG_FILE);
    let raw = fs::read(&log_path).unwrap();
    fs::write(&log_path, &raw[..raw.len() - 10]).unwrap();

    let store = Store::open(config(&dir)).unwrap();
    let tid = store.begin(RC).unwrap();
    assert_eq!(store.read(tid, kept).unwrap(), Some(b"whole".to_vec()));
    assert_eq!(store.read(tid, torn).unwrap(), None);
    store.commit(tid).unwrap();
    store.close().unwrap();

    // The truncated log reopens cleanly.
    let store = Store::open(config(&dir)).unwrap();
    let tid = store.begin(RC).unwrap();
    assert_eq!(store.read(tid, kept).unwrap(), Some(b"whole".to_vec()));
}

#[test]
fn test_repeated_crashes() {
    let dir = tempdir().unwrap();
    let mut committed = Vec::new();
    {
        let store = Store::create(config(&dir)).unwrap();
        store.close().unwrap();
    }

    for round in 0u8..3 {
        let store = Store::open(config(&dir)).unwrap();
        let tid = store.begin(RC).unwrap();
        committed.push((store.insert(tid, &[round; 32]).unwrap(), round));
        store.commit(tid).unwrap();

        let loser = store.begin(RC).unwrap();
        store.insert(loser, &[0xEE; 32]).unwrap();
        // crash
    }

    let store = Store::open(config(&dir)).unwrap();
    let tid = store.begin(RC).unwrap();
    for (id, round) in committed {
        assert_eq!(store.read(tid, id).unwrap(), Some(vec![round; 32]));
    }
}

#[test]
fn test_clean_close_hides_open_transaction() {
    let dir = tempdir().unwrap();
    let id;
    {
        let store = Store::create(config(&dir)).unwrap();
        let tid = store.begin(RC).unwrap();
        id = store.insert(tid, b"x").unwrap();
        // Left open, but the store closes cleanly.
        store.close().unwrap();
    }

    let store = Store::open(config(&dir)).unwrap();
    let tid = store.begin(RC).unwrap();
    assert_eq!(store.read(tid, id).unwrap(), None);
    store.commit(tid).unwrap();
    store.close().unwrap();
}
