//! Microbenchmarks: heap append/read and hash point lookups.

use criterion::{Criterion, criterion_group, criterion_main};
use tempfile::TempDir;

use veloxdb::heap::RecordFile;
use veloxdb::index::hash::{ExtendibleHash, HashConfig};
use veloxdb::index::{Key, KeyCodec, KeyType};
use veloxdb::schema::{Column, DataType, Record, Value};

fn columns() -> Vec<Column> {
    let mut name = Column::new("name", DataType::Varchar);
    name.size = Some(24);
    vec![
        Column::new("id", DataType::Int),
        name,
        Column::new("price", DataType::Float),
    ]
}

fn record(id: i32) -> Record {
    let mut r = Record::new();
    r.insert("id".into(), Value::Int(id));
    r.insert("name".into(), Value::Str(format!("row-{id}")));
    r.insert("price".into(), Value::Float(id as f32 * 0.5));
    r
}

fn bench_heap(c: &mut Criterion) {
    c.bench_function("heap_insert", |b| {
        let tmp = TempDir::new().unwrap();
        let mut heap = RecordFile::open(tmp.path().join("bench.dat"), columns()).unwrap();
        let mut id = 0;
        b.iter(|| {
            heap.insert(&record(id)).unwrap();
            id += 1;
        });
    });

    c.bench_function("heap_read", |b| {
        let tmp = TempDir::new().unwrap();
        let mut heap = RecordFile::open(tmp.path().join("bench.dat"), columns()).unwrap();
        for id in 0..1000 {
            heap.insert(&record(id)).unwrap();
        }
        let mut slot = 0u64;
        b.iter(|| {
            std::hint::black_box(heap.read(slot % 1000).unwrap());
            slot += 1;
        });
    });
}

fn bench_hash(c: &mut Criterion) {
    c.bench_function("hash_find", |b| {
        let tmp = TempDir::new().unwrap();
        let mut hash = ExtendibleHash::open(
            tmp.path().join("dir.bin"),
            tmp.path().join("data.bin"),
            KeyCodec::new(KeyType::Int),
            HashConfig::default(),
        )
        .unwrap();
        for key in 0..1000 {
            hash.insert_entry(Key::Int(key), key).unwrap();
        }
        let mut key = 0;
        b.iter(|| {
            std::hint::black_box(hash.find_entry(&Key::Int(key % 1000)).unwrap());
            key += 1;
        });
    });
}

criterion_group!(benches, bench_heap, bench_hash);
criterion_main!(benches);
