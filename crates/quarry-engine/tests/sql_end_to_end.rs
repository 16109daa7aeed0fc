//! End-to-end SQL scenarios driven through the database facade.

use quarry_engine::{Database, Outcome};
use quarry_types::{Row, Value};

fn db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

fn rows(db: &mut Database, sql: &str) -> Vec<Row> {
    let resp = db.execute(sql);
    match resp.outcome {
        Outcome::Rows(rows) => rows,
        other => panic!("expected rows for {sql:?}, got {other:?}"),
    }
}

fn message(db: &mut Database, sql: &str) -> String {
    let resp = db.execute(sql);
    match resp.outcome {
        Outcome::Message(m) => m,
        other => panic!("expected a message for {sql:?}, got {other:?}"),
    }
}

fn error(db: &mut Database, sql: &str) -> String {
    let resp = db.execute(sql);
    match resp.outcome {
        Outcome::Error(e) => e,
        other => panic!("expected an error for {sql:?}, got {other:?}"),
    }
}

fn int(row: &Row, key: &str) -> i64 {
    match row.get(key) {
        Some(Value::Int(i)) => *i,
        other => panic!("expected integer at {key}, got {other:?}"),
    }
}

fn text<'a>(row: &'a Row, key: &str) -> &'a str {
    match row.get(key) {
        Some(Value::Text(s)) => s,
        other => panic!("expected text at {key}, got {other:?}"),
    }
}

#[test]
fn create_insert_select() {
    let mut db = db();
    assert_eq!(
        message(&mut db, "CREATE TABLE users (name TEXT NOT NULL, email TEXT, age INTEGER);"),
        "Table 'users' created."
    );
    assert_eq!(
        message(&mut db, "INSERT INTO users (name,email,age) VALUES ('Alice','a@e.com',30);"),
        "1 row inserted (last id: 1)."
    );
    let got = rows(&mut db, "SELECT name, age FROM users WHERE age > 25 ORDER BY name;");
    assert_eq!(got.len(), 1);
    assert_eq!(text(&got[0], "name"), "Alice");
    assert_eq!(int(&got[0], "age"), 30);
}

#[test]
fn aggregate_with_group_by_and_having() {
    let mut db = db();
    db.execute("CREATE TABLE sales (region TEXT, amount INTEGER)");
    db.execute("INSERT INTO sales (region, amount) VALUES ('N', 10), ('N', 20), ('S', 5)");
    let got = rows(
        &mut db,
        "SELECT region, SUM(amount) AS total FROM sales GROUP BY region HAVING SUM(amount) > 10 ORDER BY region;",
    );
    assert_eq!(got.len(), 1);
    assert_eq!(text(&got[0], "region"), "N");
    assert_eq!(int(&got[0], "total"), 30);
}

#[test]
fn left_join_null_fills() {
    let mut db = db();
    db.execute("CREATE TABLE a (x TEXT)");
    db.execute("CREATE TABLE b (aid INTEGER, y TEXT)");
    db.execute("INSERT INTO a (x) VALUES ('p'), ('q')");
    db.execute("INSERT INTO b (aid, y) VALUES (1, 'r')");
    let got = rows(&mut db, "SELECT a.x, b.y FROM a LEFT JOIN b ON a.id=b.aid ORDER BY a.id;");
    assert_eq!(got.len(), 2);
    assert_eq!(text(&got[0], "x"), "p");
    assert_eq!(text(&got[0], "y"), "r");
    assert_eq!(text(&got[1], "x"), "q");
    assert_eq!(got[1].get("y"), Some(&Value::Null));
}

#[test]
fn upsert_with_returning() {
    let mut db = db();
    db.execute("CREATE TABLE kv (key TEXT, val INTEGER)");
    db.execute("INSERT INTO kv (key, val) VALUES ('a', 1)");
    let got = rows(
        &mut db,
        "INSERT INTO kv (key, val) VALUES ('a', 2) ON CONFLICT (key) DO UPDATE SET val = 2 RETURNING *;",
    );
    assert_eq!(got.len(), 1);
    assert_eq!(int(&got[0], "id"), 1);
    assert_eq!(text(&got[0], "key"), "a");
    assert_eq!(int(&got[0], "val"), 2);

    let all = rows(&mut db, "SELECT * FROM kv");
    assert_eq!(all.len(), 1);
    assert_eq!(int(&all[0], "val"), 2);
}

#[test]
fn upsert_do_nothing_skips() {
    let mut db = db();
    db.execute("CREATE TABLE kv (key TEXT, val INTEGER)");
    db.execute("INSERT INTO kv (key, val) VALUES ('a', 1)");
    db.execute("INSERT INTO kv (key, val) VALUES ('a', 9) ON CONFLICT (key) DO NOTHING");
    let all = rows(&mut db, "SELECT val FROM kv");
    assert_eq!(all.len(), 1);
    assert_eq!(int(&all[0], "val"), 1);
}

#[test]
fn recursive_cte_counts_to_five() {
    let mut db = db();
    let got = rows(
        &mut db,
        "WITH RECURSIVE t(n) AS (SELECT 1 UNION ALL SELECT n+1 FROM t WHERE n < 5) SELECT n FROM t;",
    );
    let ns: Vec<i64> = got.iter().map(|r| int(r, "n")).collect();
    assert_eq!(ns, vec![1, 2, 3, 4, 5]);
}

#[test]
fn transaction_rollback_restores_state() {
    let mut db = db();
    db.execute("CREATE TABLE users (name TEXT)");
    db.execute("INSERT INTO users (name) VALUES ('Alice')");

    assert_eq!(message(&mut db, "BEGIN"), "Transaction started.");
    assert!(db.in_transaction());
    db.execute("INSERT INTO users (name) VALUES ('Bob')");
    let during = rows(&mut db, "SELECT COUNT(*) FROM users");
    assert_eq!(int(&during[0], "COUNT(*)"), 2);

    assert_eq!(message(&mut db, "ROLLBACK"), "Transaction rolled back.");
    assert!(!db.in_transaction());
    let after = rows(&mut db, "SELECT COUNT(*) FROM users");
    assert_eq!(int(&after[0], "COUNT(*)"), 1);
}

#[test]
fn transaction_commit_keeps_changes() {
    let mut db = db();
    db.execute("CREATE TABLE t (a INTEGER)");
    db.execute("BEGIN");
    db.execute("INSERT INTO t (a) VALUES (1)");
    assert_eq!(message(&mut db, "COMMIT"), "Transaction committed.");
    assert_eq!(rows(&mut db, "SELECT * FROM t").len(), 1);

    // Transaction state errors travel as error events.
    assert!(error(&mut db, "COMMIT").contains("no active transaction"));
    db.execute("BEGIN");
    assert!(error(&mut db, "BEGIN").contains("already active"));
}

#[test]
fn update_delete_and_truncate() {
    let mut db = db();
    db.execute("CREATE TABLE t (a INTEGER, b TEXT)");
    db.execute("INSERT INTO t (a, b) VALUES (1, 'x'), (2, 'y'), (3, 'z')");

    assert_eq!(message(&mut db, "UPDATE t SET b = 'w' WHERE a > 1"), "2 rows updated.");
    let got = rows(&mut db, "SELECT b FROM t WHERE a = 3");
    assert_eq!(text(&got[0], "b"), "w");

    assert_eq!(message(&mut db, "DELETE FROM t WHERE id = 1"), "1 row deleted.");
    assert_eq!(rows(&mut db, "SELECT * FROM t").len(), 2);

    assert_eq!(message(&mut db, "TRUNCATE TABLE t"), "2 rows deleted.");
    assert_eq!(rows(&mut db, "SELECT * FROM t").len(), 0);
}

#[test]
fn update_with_expression_and_returning() {
    let mut db = db();
    db.execute("CREATE TABLE acct (balance INTEGER)");
    db.execute("INSERT INTO acct (balance) VALUES (100)");
    let got = rows(&mut db, "UPDATE acct SET balance = balance + 50 WHERE id = 1 RETURNING balance");
    assert_eq!(int(&got[0], "balance"), 150);
}

#[test]
fn ids_stay_monotonic_across_deletes() {
    let mut db = db();
    db.execute("CREATE TABLE t (a INTEGER)");
    db.execute("INSERT INTO t (a) VALUES (1), (2)");
    db.execute("DELETE FROM t");
    assert_eq!(
        message(&mut db, "INSERT INTO t (a) VALUES (3)"),
        "1 row inserted (last id: 3)."
    );
}

#[test]
fn positional_insert_and_default_values() {
    let mut db = db();
    db.execute("CREATE TABLE t (a INTEGER, b TEXT DEFAULT 'dflt')");
    db.execute("INSERT INTO t VALUES (1, 'x')");
    db.execute("INSERT INTO t DEFAULT VALUES");
    let got = rows(&mut db, "SELECT a, b FROM t ORDER BY id");
    assert_eq!(text(&got[0], "b"), "x");
    assert_eq!(got[1].get("a"), Some(&Value::Null));
    assert_eq!(text(&got[1], "b"), "dflt");
}

#[test]
fn not_null_violation_is_an_error() {
    let mut db = db();
    db.execute("CREATE TABLE t (a TEXT NOT NULL)");
    assert!(error(&mut db, "INSERT INTO t (a) VALUES (NULL)").contains("NOT NULL"));
}

#[test]
fn unique_index_rejects_duplicates() {
    let mut db = db();
    db.execute("CREATE TABLE users (email TEXT)");
    db.execute("INSERT INTO users (email) VALUES ('a@e.com')");
    assert_eq!(
        message(&mut db, "CREATE UNIQUE INDEX idx_email ON users (email)"),
        "Index 'idx_email' created."
    );
    assert!(error(&mut db, "INSERT INTO users (email) VALUES ('a@e.com')").contains("duplicate key"));

    // Index creation over existing duplicates is also rejected.
    db.execute("CREATE TABLE dup (v INTEGER)");
    db.execute("INSERT INTO dup (v) VALUES (1), (1)");
    assert!(error(&mut db, "CREATE UNIQUE INDEX idx_v ON dup (v)").contains("duplicate key"));
}

#[test]
fn indexed_equality_lookup_matches_scan() {
    let mut db = db();
    db.execute("CREATE TABLE t (v INTEGER)");
    db.execute("INSERT INTO t (v) VALUES (1), (2), (2), (3)");
    db.execute("CREATE INDEX idx_v ON t (v)");
    let got = rows(&mut db, "SELECT id FROM t WHERE v = 2 ORDER BY id");
    assert_eq!(got.len(), 2);
    assert_eq!(int(&got[0], "id"), 2);
    assert_eq!(int(&got[1], "id"), 3);

    let ranged = rows(&mut db, "SELECT id FROM t WHERE v >= 2");
    assert_eq!(ranged.len(), 3);
}

#[test]
fn subqueries_scalar_in_exists() {
    let mut db = db();
    db.execute("CREATE TABLE t (v INTEGER)");
    db.execute("INSERT INTO t (v) VALUES (10), (20), (30)");
    db.execute("CREATE TABLE u (tv INTEGER)");
    db.execute("INSERT INTO u (tv) VALUES (10), (30)");

    let got = rows(&mut db, "SELECT v FROM t WHERE v = (SELECT MAX(v) FROM t)");
    assert_eq!(got.len(), 1);
    assert_eq!(int(&got[0], "v"), 30);

    let got = rows(&mut db, "SELECT v FROM t WHERE v IN (SELECT tv FROM u) ORDER BY v");
    assert_eq!(got.len(), 2);
    assert_eq!(int(&got[1], "v"), 30);

    let got = rows(&mut db, "SELECT v FROM t WHERE EXISTS (SELECT 1 FROM u WHERE tv = 99)");
    assert!(got.is_empty());

    let got = rows(&mut db, "SELECT v FROM t WHERE v NOT IN (SELECT tv FROM u)");
    assert_eq!(got.len(), 1);
    assert_eq!(int(&got[0], "v"), 20);
}

#[test]
fn derived_tables_and_set_operations() {
    let mut db = db();
    db.execute("CREATE TABLE t (v INTEGER)");
    db.execute("INSERT INTO t (v) VALUES (1), (2), (3)");
    db.execute("CREATE TABLE u (v INTEGER)");
    db.execute("INSERT INTO u (v) VALUES (2), (3), (4)");

    let got = rows(&mut db, "SELECT v FROM (SELECT v FROM t WHERE v > 1) d WHERE v < 3");
    assert_eq!(got.len(), 1);
    assert_eq!(int(&got[0], "v"), 2);

    let union = rows(&mut db, "SELECT v FROM t UNION SELECT v FROM u ORDER BY v");
    let vs: Vec<i64> = union.iter().map(|r| int(r, "v")).collect();
    assert_eq!(vs, vec![1, 2, 3, 4]);

    let union_all = rows(&mut db, "SELECT v FROM t UNION ALL SELECT v FROM u");
    assert_eq!(union_all.len(), 6);

    let except = rows(&mut db, "SELECT v FROM t EXCEPT SELECT v FROM u");
    assert_eq!(except.iter().map(|r| int(r, "v")).collect::<Vec<_>>(), vec![1]);

    let intersect = rows(&mut db, "SELECT v FROM t INTERSECT SELECT v FROM u ORDER BY v");
    assert_eq!(intersect.iter().map(|r| int(r, "v")).collect::<Vec<_>>(), vec![2, 3]);
}

#[test]
fn window_functions_rank_rows() {
    let mut db = db();
    db.execute("CREATE TABLE emp (dept TEXT, salary INTEGER)");
    db.execute("INSERT INTO emp (dept, salary) VALUES ('a', 10), ('a', 20), ('b', 30), ('a', 20)");
    let got = rows(
        &mut db,
        "SELECT dept, salary, ROW_NUMBER() OVER (PARTITION BY dept ORDER BY salary DESC) AS rn, \
         RANK() OVER (PARTITION BY dept ORDER BY salary DESC) AS rk FROM emp ORDER BY id",
    );
    assert_eq!(got.len(), 4);
    // dept a salaries: 10, 20, 20 -> rn 3/1/2 (stable), rank 3/1/1.
    assert_eq!(int(&got[0], "rn"), 3);
    assert_eq!(int(&got[0], "rk"), 3);
    assert_eq!(int(&got[1], "rk"), 1);
    assert_eq!(int(&got[3], "rk"), 1);
    assert_eq!(int(&got[2], "rn"), 1);

    let sums = rows(&mut db, "SELECT dept, SUM(salary) OVER (PARTITION BY dept) AS total FROM emp ORDER BY id");
    assert_eq!(int(&sums[0], "total"), 50);
    assert_eq!(int(&sums[2], "total"), 30);
}

#[test]
fn expressions_and_functions_in_projections() {
    let mut db = db();
    let got = rows(&mut db, "SELECT 1 + 2 * 3 AS n, UPPER('abc') AS u, 'a' || 'b' AS c");
    assert_eq!(int(&got[0], "n"), 7);
    assert_eq!(text(&got[0], "u"), "ABC");
    assert_eq!(text(&got[0], "c"), "ab");

    let got = rows(
        &mut db,
        "SELECT CASE WHEN 2 > 1 THEN 'yes' ELSE 'no' END AS answer, IIF(1 = 2, 'a', 'b') AS pick, \
         COALESCE(NULL, 7) AS seven, CAST('42' AS INTEGER) AS n42, TYPEOF(1.5) AS ty",
    );
    assert_eq!(text(&got[0], "answer"), "yes");
    assert_eq!(text(&got[0], "pick"), "b");
    assert_eq!(int(&got[0], "seven"), 7);
    assert_eq!(int(&got[0], "n42"), 42);
    assert_eq!(text(&got[0], "ty"), "real");
}

#[test]
fn like_between_and_is_null() {
    let mut db = db();
    db.execute("CREATE TABLE p (name TEXT, price INTEGER)");
    db.execute("INSERT INTO p (name, price) VALUES ('Apple', 10), ('apricot', 20), ('Banana', 30), (NULL, 40)");

    let got = rows(&mut db, "SELECT name FROM p WHERE name LIKE 'A%'");
    assert_eq!(got.len(), 1);
    let got = rows(&mut db, "SELECT name FROM p WHERE name ILIKE 'a%' ORDER BY name");
    assert_eq!(got.len(), 2);
    let got = rows(&mut db, "SELECT name FROM p WHERE price BETWEEN 15 AND 35 AND name IS NOT NULL ORDER BY price");
    assert_eq!(got.len(), 2);
    let got = rows(&mut db, "SELECT price FROM p WHERE name IS NULL");
    assert_eq!(int(&got[0], "price"), 40);
}

#[test]
fn distinct_order_limit_offset() {
    let mut db = db();
    db.execute("CREATE TABLE t (v INTEGER)");
    db.execute("INSERT INTO t (v) VALUES (3), (1), (3), (2), (1)");
    let got = rows(&mut db, "SELECT DISTINCT v FROM t ORDER BY v DESC LIMIT 2 OFFSET 1");
    let vs: Vec<i64> = got.iter().map(|r| int(r, "v")).collect();
    assert_eq!(vs, vec![2, 1]);
}

#[test]
fn insert_select_and_create_table_as_select() {
    let mut db = db();
    db.execute("CREATE TABLE src (v INTEGER)");
    db.execute("INSERT INTO src (v) VALUES (1), (2), (3)");
    db.execute("CREATE TABLE dst (v INTEGER)");

    assert_eq!(
        message(&mut db, "INSERT INTO dst (v) SELECT v FROM src WHERE v > 1"),
        "2 rows inserted (last id: 2)."
    );
    assert_eq!(rows(&mut db, "SELECT * FROM dst").len(), 2);

    let msg = message(&mut db, "CREATE TABLE copy AS SELECT v FROM src");
    assert!(msg.contains("Table 'copy' created."));
    assert_eq!(rows(&mut db, "SELECT * FROM copy").len(), 3);
}

#[test]
fn alter_table_forms() {
    let mut db = db();
    db.execute("CREATE TABLE t (a INTEGER)");
    db.execute("INSERT INTO t (a) VALUES (1)");

    assert_eq!(
        message(&mut db, "ALTER TABLE t ADD COLUMN note TEXT DEFAULT 'x'"),
        "Column 'note' added to 't'."
    );
    let got = rows(&mut db, "SELECT note FROM t");
    assert_eq!(text(&got[0], "note"), "x");

    assert_eq!(message(&mut db, "ALTER TABLE t DROP COLUMN note"), "Column 'note' dropped from 't'.");
    let got = rows(&mut db, "SELECT * FROM t");
    assert!(got[0].get("note").is_none());

    assert!(error(&mut db, "ALTER TABLE t DROP COLUMN id").contains("cannot be dropped"));

    assert_eq!(message(&mut db, "ALTER TABLE t RENAME TO t2"), "Table 't' renamed to 't2'.");
    assert_eq!(rows(&mut db, "SELECT * FROM t2").len(), 1);
    assert!(rows(&mut db, "SELECT * FROM t").is_empty());
}

#[test]
fn views_triggers_constraints_are_metadata() {
    let mut db = db();
    db.execute("CREATE TABLE t (a INTEGER)");

    assert_eq!(
        message(&mut db, "CREATE VIEW v AS SELECT a FROM t WHERE a > 0"),
        "View 'v' created."
    );
    assert!(error(&mut db, "CREATE VIEW v AS SELECT a FROM t").contains("already exists"));
    assert_eq!(message(&mut db, "DROP VIEW v"), "View 'v' dropped.");

    assert_eq!(
        message(&mut db, "CREATE TRIGGER audit AFTER INSERT ON t FOR EACH ROW INSERT INTO log (m) VALUES ('hi')"),
        "Trigger created."
    );
    assert_eq!(message(&mut db, "DROP TRIGGER audit"), "Trigger dropped.");

    assert_eq!(
        message(&mut db, "ALTER TABLE t ADD CONSTRAINT positive CHECK (a > 0)"),
        "Constraint 'positive' created."
    );
    assert_eq!(
        message(&mut db, "ALTER TABLE t DROP CONSTRAINT positive"),
        "Constraint 'positive' dropped."
    );
}

#[test]
fn schema_listing_is_sorted() {
    let mut db = db();
    db.execute("CREATE TABLE zebra (a INTEGER)");
    db.execute("CREATE TABLE apple (b TEXT)");
    let schema = db.schema().unwrap();
    let names: Vec<&str> = schema.iter().map(|t| t.table.as_str()).collect();
    assert_eq!(names, vec!["apple", "zebra"]);
    assert_eq!(schema[0].columns[0].name, "b");
}

#[test]
fn explain_lists_pipeline_steps() {
    let mut db = db();
    db.execute("CREATE TABLE t (v INTEGER)");
    let got = rows(&mut db, "EXPLAIN SELECT v FROM t WHERE v > 1 ORDER BY v LIMIT 2");
    let kinds: Vec<&str> = got.iter().map(|r| text(r, "kind")).collect();
    assert_eq!(kinds, vec!["table_scan", "filter", "project", "order_by", "limit"]);
    assert_eq!(int(&got[0], "step"), 1);
}

#[test]
fn errors_are_data_not_panics() {
    let mut db = db();
    assert!(!error(&mut db, "FLY ME TO the moon").is_empty());
    assert!(error(&mut db, "SELECT FROM WHERE").len() > 0);
    assert!(error(&mut db, "INSERT INTO missing (a) VALUES (1)").contains("no such table"));
    db.execute("CREATE TABLE t (a INTEGER)");
    assert!(error(&mut db, "CREATE TABLE t (a INTEGER)").contains("already exists"));
    assert_eq!(
        message(&mut db, "CREATE TABLE IF NOT EXISTS t (a INTEGER)"),
        "Table 't' already exists."
    );
    assert!(error(&mut db, "DROP TABLE missing").contains("no such table"));
    assert_eq!(message(&mut db, "DROP TABLE IF EXISTS missing"), "OK.");
    assert!(error(&mut db, "INSERT INTO t (nope) VALUES (1)").contains("no such column"));
}

#[test]
fn if_exists_flags_suppress_schema_errors() {
    let mut db = db();
    db.execute("CREATE TABLE t (a INTEGER)");
    assert_eq!(message(&mut db, "DROP TABLE IF EXISTS t"), "Table 't' dropped.");
    assert_eq!(message(&mut db, "DROP TABLE IF EXISTS t"), "OK.");
}

#[test]
fn plain_cte_is_visible_to_the_outer_query() {
    let mut db = db();
    db.execute("CREATE TABLE t (v INTEGER)");
    db.execute("INSERT INTO t (v) VALUES (1), (2), (3)");
    let got = rows(
        &mut db,
        "WITH big(v) AS (SELECT v FROM t WHERE v > 1) SELECT v FROM big ORDER BY v DESC",
    );
    let vs: Vec<i64> = got.iter().map(|r| int(r, "v")).collect();
    assert_eq!(vs, vec![3, 2]);
}

#[test]
fn group_concat_and_count_distinct() {
    let mut db = db();
    db.execute("CREATE TABLE t (g TEXT, v INTEGER)");
    db.execute("INSERT INTO t (g, v) VALUES ('a', 1), ('a', 1), ('a', 2), ('b', 3)");
    let got = rows(
        &mut db,
        "SELECT g, COUNT(DISTINCT v) AS dv, GROUP_CONCAT(v SEPARATOR '-') AS cs FROM t GROUP BY g ORDER BY g",
    );
    assert_eq!(int(&got[0], "dv"), 2);
    assert_eq!(text(&got[0], "cs"), "1-1-2");
    assert_eq!(int(&got[1], "dv"), 1);
}

#[test]
fn update_from_joins_another_table() {
    let mut db = db();
    db.execute("CREATE TABLE orders (customer_id INTEGER, discount INTEGER)");
    db.execute("CREATE TABLE vips (cid INTEGER, pct INTEGER)");
    db.execute("INSERT INTO orders (customer_id, discount) VALUES (1, 0), (2, 0)");
    db.execute("INSERT INTO vips (cid, pct) VALUES (2, 15)");
    let msg = message(
        &mut db,
        "UPDATE orders SET discount = vips.pct FROM vips WHERE orders.customer_id = vips.cid",
    );
    assert_eq!(msg, "1 row updated.");
    let got = rows(&mut db, "SELECT discount FROM orders ORDER BY id");
    assert_eq!(int(&got[0], "discount"), 0);
    assert_eq!(int(&got[1], "discount"), 15);
}

#[test]
fn delete_with_returning_reports_rows() {
    let mut db = db();
    db.execute("CREATE TABLE t (v INTEGER)");
    db.execute("INSERT INTO t (v) VALUES (1), (2)");
    let got = rows(&mut db, "DELETE FROM t WHERE v = 2 RETURNING v");
    assert_eq!(got.len(), 1);
    assert_eq!(int(&got[0], "v"), 2);
}

#[test]
fn diagnostics_record_dispatched_events() {
    let mut db = db();
    let resp = db.execute("SELECT 1 AS one");
    assert!(resp.rows().is_some());
    assert!(resp.diagnostics.events >= 3, "sql, select_parse, query_plan at least");
    let sigs = db.last_events();
    assert!(sigs.iter().any(|s| s == "query_plan"));
}
