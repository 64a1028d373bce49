//! DML micro-benchmarks over a throwaway database.

use criterion::{criterion_group, criterion_main, Criterion};

use minidb_common::{DatabaseConfig, RowId};
use minidb_engine::{Column, Database, SetClause, Value};

fn open_db(dir: &tempfile::TempDir) -> Database {
    let config = DatabaseConfig::new(dir.path())
        .with_numa_nodes(2)
        .with_checkpoint_on_dml(false);
    let db = Database::open(config).unwrap();
    db.create_table("bench", vec![Column::int("id"), Column::text("payload", 32)])
        .unwrap();
    db
}

fn bench_insert(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);

    let mut i = 0i32;
    c.bench_function("insert", |b| {
        b.iter(|| {
            i = i.wrapping_add(1);
            db.insert("bench", vec![Value::int(i), Value::text("payload")])
                .unwrap()
        })
    });
}

fn bench_point_update(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    for i in 0..1024 {
        db.insert("bench", vec![Value::int(i), Value::text("payload")])
            .unwrap();
    }

    let mut row = 0u64;
    c.bench_function("update_row", |b| {
        b.iter(|| {
            row = (row + 1) % 1024;
            db.update_row(
                "bench",
                RowId::new(row),
                vec![SetClause::new("payload", Value::text("updated"))],
            )
            .unwrap();
        })
    });
}

fn bench_point_read(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir);
    for i in 0..1024 {
        db.insert("bench", vec![Value::int(i), Value::text("payload")])
            .unwrap();
    }

    let mut row = 0u64;
    c.bench_function("read_row", |b| {
        b.iter(|| {
            row = (row + 1) % 1024;
            db.read_row("bench", RowId::new(row)).unwrap()
        })
    });
}

criterion_group!(benches, bench_insert, bench_point_update, bench_point_read);
criterion_main!(benches);
