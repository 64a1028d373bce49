//! NUMA routing: rows land on the shard their page maps to, and one
//! node's evictions never disturb another node's cache.

use std::sync::Arc;

use minidb_common::config::NumaOptions;
use minidb_common::{DatabaseConfig, RowId};
use minidb_engine::{Column, Database, Schema, TableStorage, Value};
use tempfile::tempdir;

/// id INT (4) + name TEXT(27) + validity byte = 32-byte records, so a
/// 64-byte page holds exactly two rows.
fn narrow_schema() -> Vec<Column> {
    vec![Column::int("id"), Column::text("name", 27)]
}

#[test]
fn rows_map_to_alternating_nodes() {
    let dir = tempdir().unwrap();
    let table = TableStorage::new(
        dir.path().join("t.tbl"),
        "t",
        Schema::new(narrow_schema()),
        64,
        8,
        2,
        NumaOptions::disabled(),
        None,
    )
    .unwrap();
    table.load().unwrap();

    for i in 0..10 {
        table
            .insert(vec![Value::int(i), Value::text("x")])
            .unwrap();
    }

    // Records start on page 1, two per page: rows 0-1 on page 1 (node 1),
    // rows 2-3 on page 2 (node 0), and so on.
    for row in 0..10u64 {
        let page = table.page_id_for_row(RowId::new(row));
        assert_eq!(page.as_u64(), 1 + row / 2);
        assert_eq!(table.node_for_row(RowId::new(row)), ((1 + row / 2) % 2) as usize);
    }

    let counts = table.cached_pages_per_node();
    assert_eq!(counts.len(), 2);
    assert!(counts[0] >= 1);
    assert!(counts[1] >= 1);
}

#[test]
fn cached_pages_accumulate_on_both_nodes() {
    let dir = tempdir().unwrap();
    let config = DatabaseConfig::new(dir.path())
        .with_page_size(64)
        .with_cache_pages(8)
        .with_numa_nodes(2)
        .with_checkpoint_on_dml(false);
    let db = Database::open(config).unwrap();
    db.create_table("t", narrow_schema()).unwrap();

    for i in 0..10 {
        db.insert("t", vec![Value::int(i), Value::text("x")]).unwrap();
    }

    let counts = db.cached_pages_per_node();
    assert_eq!(counts.len(), 2);
    assert!(counts[0] >= 1, "node 0 should cache the even pages");
    assert!(counts[1] >= 1, "node 1 should cache the odd pages");
    db.close().unwrap();
}

#[test]
fn evictions_on_one_node_leave_the_other_untouched() {
    let dir = tempdir().unwrap();
    // Two nodes, one cached page each: every new page on a node evicts.
    let table = Arc::new(
        TableStorage::new(
            dir.path().join("t.tbl"),
            "t",
            Schema::new(narrow_schema()),
            64,
            2,
            2,
            NumaOptions::disabled(),
            None,
        )
        .unwrap(),
    );
    table.load().unwrap();

    for i in 0..12 {
        table
            .insert(vec![Value::int(i), Value::text("x")])
            .unwrap();
    }
    let node1_before = table.cached_pages_per_node()[1];

    // Churn node 0 by touching its pages (2, 4, 6): rows 2-3, 6-7, 10-11.
    for row in [2u64, 6, 10, 2, 6, 10] {
        table.read_row(RowId::new(row)).unwrap();
    }

    let counts = table.cached_pages_per_node();
    assert_eq!(counts[1], node1_before);
    assert!(counts[0] <= 1);
}
