use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tempfile::TempDir;

use nvs_kv::{FlashDelegate, KeyValueStore, NvsDelegate, RecordingDelegate};

fn flash_store(tmp: &TempDir) -> KeyValueStore {
    let flash: Arc<dyn NvsDelegate> =
        Arc::new(FlashDelegate::mount(&tmp.path().join("bench.redb"), 100_000, Default::default()).unwrap());
    KeyValueStore::new(flash, "bench")
}

fn bench_flash_set(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = flash_store(&tmp);

    c.bench_function("flash_set", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100);
            store.set(black_box(&key), black_box("hello world")).unwrap();
            i += 1;
        });
    });
}

fn bench_flash_get(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    let store = flash_store(&tmp);

    // Pre-populate.
    for i in 0..100 {
        store.set(&format!("key:{:03}", i), "hello world").unwrap();
    }

    c.bench_function("flash_get", |b| {
        let mut i = 0u64;
        let mut buf = [0u8; 64];
        b.iter(|| {
            let key = format!("key:{:03}", i % 100);
            store.get(black_box(&key), &mut buf).unwrap();
            i += 1;
        });
    });
}

fn bench_recording_get(c: &mut Criterion) {
    let delegate = Arc::new(RecordingDelegate::new());
    delegate.seed("bench", "key", "hello world");
    let store = KeyValueStore::new(delegate.clone(), "bench");

    c.bench_function("recording_get", |b| {
        let mut buf = [0u8; 64];
        b.iter(|| {
            store.get(black_box("key"), &mut buf).unwrap();
            delegate.clear_calls();
        });
    });
}

criterion_group!(benches, bench_flash_set, bench_flash_get, bench_recording_get);
criterion_main!(benches);
