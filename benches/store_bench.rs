//! Criterion benchmarks for the store.
//!
//! Inserts fsync the log, so insert numbers are dominated by the disk.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use tempfile::tempdir;
use versadb::concurrency::LockManager;
use versadb::{Config, IsolationLevel, ItemId, PageNo, Store};

fn open_store(dir: &tempfile::TempDir) -> Store {
    Store::create(Config {
        path: dir.path().join("bench"),
        ..Default::default()
    })
    .unwrap()
}

pub fn insert_latency(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    let tid = store.begin(IsolationLevel::ReadCommitted).unwrap();
    let payload = vec![0xAB_u8; 64];

    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("64b", |b| {
        b.iter(|| store.insert(tid, black_box(&payload)).unwrap())
    });
    group.finish();
}

pub fn read_latency(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    let writer = store.begin(IsolationLevel::ReadCommitted).unwrap();
    let ids: Vec<ItemId> = (0..256u32)
        .map(|i| store.insert(writer, &i.to_le_bytes()).unwrap())
        .collect();
    store.commit(writer).unwrap();

    for (name, level) in [
        ("read_committed", IsolationLevel::ReadCommitted),
        ("repeatable_read", IsolationLevel::RepeatableRead),
    ] {
        let reader = store.begin(level).unwrap();
        let mut next = 0;
        c.bench_function(&format!("read/{}", name), |b| {
            b.iter(|| {
                next = (next + 1) % ids.len();
                black_box(store.read(reader, ids[next]).unwrap())
            })
        });
        store.commit(reader).unwrap();
    }
}

pub fn lock_cycle(c: &mut Criterion) {
    c.bench_function("lock/acquire_release", |b| {
        b.iter_batched(
            LockManager::new,
            |lm| {
                for n in 0..16u16 {
                    lm.add(1, ItemId::new(PageNo::new(2), n)).unwrap();
                }
                lm.remove(1);
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(writes, insert_latency);
criterion_group!(reads, read_latency, lock_cycle);
criterion_main!(writes, reads);
