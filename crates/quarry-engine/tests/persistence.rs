//! File-backed persistence behavior through the facade.

use quarry_engine::{Database, Outcome};
use quarry_types::Value;

#[test]
fn reopen_sees_committed_data() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut db = Database::open(dir.path()).unwrap();
        db.execute("CREATE TABLE notes (body TEXT)");
        db.execute("INSERT INTO notes (body) VALUES ('first'), ('second')");
    }
    let mut db = Database::open(dir.path()).unwrap();
    let resp = db.execute("SELECT body FROM notes ORDER BY id");
    match resp.outcome {
        Outcome::Rows(rows) => {
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].get("body"), Some(&Value::Text("first".into())));
        }
        other => panic!("unexpected {other:?}"),
    }

    // The counter survives too: new ids continue from the stored state.
    let resp = db.execute("INSERT INTO notes (body) VALUES ('third')");
    match resp.outcome {
        Outcome::Message(m) => assert_eq!(m, "1 row inserted (last id: 3)."),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn on_disk_layout_matches_the_contract() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::open(dir.path()).unwrap();
    db.execute("CREATE TABLE t (a INTEGER)");
    db.execute("INSERT INTO t (a) VALUES (7)");

    let schema_ref = dir.path().join("refs/db/tables/t/schema");
    assert!(schema_ref.exists());
    let hash = std::fs::read_to_string(&schema_ref).unwrap();
    let blob = dir.path().join("store").join(&hash[..2]).join(&hash[2..]);
    assert!(blob.exists(), "every ref resolves to a stored blob");
    assert!(dir.path().join("refs/db/tables/t/rows/1").exists());
    assert!(dir.path().join("refs/db/tables/t/next_id").exists());
}

#[test]
fn rollback_restores_files_byte_identically() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::open(dir.path()).unwrap();
    db.execute("CREATE TABLE t (a INTEGER)");
    db.execute("INSERT INTO t (a) VALUES (1)");

    db.execute("BEGIN");
    db.execute("INSERT INTO t (a) VALUES (2)");
    db.execute("DELETE FROM t WHERE id = 1");
    db.execute("ROLLBACK");

    let resp = db.execute("SELECT a FROM t");
    match resp.outcome {
        Outcome::Rows(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].get("a"), Some(&Value::Int(1)));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!dir.path().join("refs/db/tables/t/rows/2").exists());
}

#[test]
fn dropped_table_leaves_no_refs_behind() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = Database::open(dir.path()).unwrap();
    db.execute("CREATE TABLE t (a INTEGER)");
    db.execute("INSERT INTO t (a) VALUES (1)");
    db.execute("DROP TABLE t");
    assert!(!dir.path().join("refs/db/tables/t").exists());
    // Blobs are immutable and never deleted.
    assert!(dir.path().join("store").exists());
}
