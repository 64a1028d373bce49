//! Crash-recovery tests: drop the database without flushing and verify the
//! redo log replays every post-image on reopen.

use minidb_common::{DatabaseConfig, RowId};
use minidb_engine::{Column, Condition, Database, SetClause, Value};
use tempfile::tempdir;

fn config(dir: &tempfile::TempDir) -> DatabaseConfig {
    // Deferred checkpoints keep redo records in the log so a crash has
    // something to recover from.
    DatabaseConfig::new(dir.path()).with_checkpoint_on_dml(false)
}

#[test]
fn recovery_replays_post_images() {
    let dir = tempdir().unwrap();
    {
        let db = Database::open(config(&dir)).unwrap();
        db.create_table("t", vec![Column::int("id"), Column::text("v", 4)])
            .unwrap();
        db.insert("t", vec![Value::int(1), Value::text("a")]).unwrap();
        db.update(
            "t",
            &[SetClause::new("v", Value::text("zz"))],
            Some(&Condition::new("id", Value::int(1))),
        )
        .unwrap();
        // Crash: drop without close, losing every unflushed page.
        drop(db);
    }

    let db = Database::open(config(&dir)).unwrap();
    let rows = db
        .select("t", Some(&Condition::new("id", Value::int(1))))
        .unwrap();
    assert_eq!(rows, vec![vec![Value::int(1), Value::text("zz")]]);

    // Recovery truncated the log.
    let log = std::fs::read_to_string(dir.path().join("db.log")).unwrap();
    assert!(log.is_empty());
    db.close().unwrap();
}

#[test]
fn recovery_restores_deletes_and_free_list() {
    let dir = tempdir().unwrap();
    {
        let db = Database::open(config(&dir)).unwrap();
        db.create_table("t", vec![Column::int("id")]).unwrap();
        for i in 0..3 {
            db.insert("t", vec![Value::int(i)]).unwrap();
        }
        db.remove("t", Some(&Condition::new("id", Value::int(1))))
            .unwrap();
        drop(db);
    }

    let db = Database::open(config(&dir)).unwrap();
    let rows = db.select("t", None).unwrap();
    assert_eq!(rows, vec![vec![Value::int(0)], vec![Value::int(2)]]);

    // The freed slot was rediscovered by the post-replay scan.
    let reused = db.insert("t", vec![Value::int(9)]).unwrap();
    assert_eq!(reused, RowId::new(1));
    db.close().unwrap();
}

#[test]
fn recovery_is_idempotent_across_reopens() {
    let dir = tempdir().unwrap();
    {
        let db = Database::open(config(&dir)).unwrap();
        db.create_table("t", vec![Column::int("id"), Column::text("v", 8)])
            .unwrap();
        for i in 0..5 {
            db.insert("t", vec![Value::int(i), Value::text("x")]).unwrap();
        }
        drop(db);
    }
    // First reopen replays and truncates; the second has nothing to do.
    {
        let db = Database::open(config(&dir)).unwrap();
        assert_eq!(db.select("t", None).unwrap().len(), 5);
        drop(db);
    }
    let db = Database::open(config(&dir)).unwrap();
    assert_eq!(db.select("t", None).unwrap().len(), 5);
    db.close().unwrap();
}

#[test]
fn clean_close_leaves_nothing_to_replay() {
    let dir = tempdir().unwrap();
    {
        let db = Database::open(config(&dir)).unwrap();
        db.create_table("t", vec![Column::int("id")]).unwrap();
        db.insert("t", vec![Value::int(7)]).unwrap();
        db.close().unwrap();
    }
    let log = std::fs::read_to_string(dir.path().join("db.log")).unwrap();
    assert!(log.is_empty());

    let db = Database::open(config(&dir)).unwrap();
    assert_eq!(db.select("t", None).unwrap(), vec![vec![Value::int(7)]]);
    db.close().unwrap();
}

#[test]
fn point_mutations_recover_too() {
    let dir = tempdir().unwrap();
    {
        let db = Database::open(config(&dir)).unwrap();
        db.create_table("t", vec![Column::int("id"), Column::text("v", 4)])
            .unwrap();
        for i in 0..4 {
            db.insert("t", vec![Value::int(i), Value::text("old")])
                .unwrap();
        }
        db.update_row(
            "t",
            RowId::new(2),
            vec![SetClause::new("v", Value::text("new"))],
        )
        .unwrap();
        db.delete_row("t", RowId::new(0)).unwrap();
        drop(db);
    }

    let db = Database::open(config(&dir)).unwrap();
    let (_, valid) = db.read_row("t", RowId::new(0)).unwrap();
    assert!(!valid);
    let (values, valid) = db.read_row("t", RowId::new(2)).unwrap();
    assert!(valid);
    assert_eq!(values, vec![Value::int(2), Value::text("new")]);
    db.close().unwrap();
}
