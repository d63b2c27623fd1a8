use std::fs;

use rusqlite::Connection;
use sqlean::Value;
use tempfile::{tempdir, TempDir};

fn open() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    sqlean::vsv::init(&conn).unwrap();
    conn
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

fn query_rows(conn: &Connection, sql: &str) -> Vec<Vec<Value>> {
    let mut stmt = conn.prepare(sql).unwrap();
    let n = stmt.column_count();
    let rows = stmt
        .query_map([], |row| (0..n).map(|i| row.get::<_, Value>(i)).collect())
        .unwrap();
    rows.collect::<rusqlite::Result<Vec<_>>>().unwrap()
}

fn column_names(conn: &Connection, table: &str) -> Vec<String> {
    let stmt = conn.prepare(&format!("select * from {}", table)).unwrap();
    stmt.column_names().into_iter().map(String::from).collect()
}

fn text(s: &str) -> Value {
    Value::from(s)
}

#[test]
fn test_header_names_columns() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "f.csv", "id,name\n1,a\n2,b\n");
    let conn = open();
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE t USING vsv('{}', header=on)",
        path
    ))
    .unwrap();

    assert_eq!(column_names(&conn, "t"), vec!["id", "name"]);
    assert_eq!(
        query_rows(&conn, "select id, name from t"),
        vec![vec![text("1"), text("a")], vec![text("2"), text("b")]]
    );
}

#[test]
fn test_quoted_field_keeps_separator() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "f.csv", "a,b\n\"x,y\",z\n");
    let conn = open();
    conn.execute_batch(&format!("CREATE VIRTUAL TABLE t USING vsv(filename='{}')", path))
        .unwrap();

    assert_eq!(query_rows(&conn, "select a, b from t"), vec![vec![text("x,y"), text("z")]]);
}

#[test]
fn test_doubled_quotes_are_unescaped() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "f.csv", "a\n\"he said \"\"hi\"\"\"\n");
    let conn = open();
    conn.execute_batch(&format!("CREATE VIRTUAL TABLE t USING vsv('{}')", path))
        .unwrap();

    assert_eq!(query_rows(&conn, "select a from t"), vec![vec![text("he said \"hi\"")]]);
}

#[test]
fn test_crlf_and_missing_final_newline() {
    let dir = tempdir().unwrap();
    let path = write_file(&dir, "f.csv", "a,b\r\n1,2\r\n3,4");
    let conn = open();
    conn.execute_batch(&format!("CREATE VIRTUAL TABLE t USING vsv('{}')", path))
        .unwrap();

    assert_eq!(
        query_rows(&conn, "select a, b from t"),
        vec![vec![text("1"), text("2")], vec![text("3"), text("4")]]
    );
}

#[test]
fn test_header_off_synthesizes_names() {
    let conn = open();
    conn.execute_batch("CREATE VIRTUAL TABLE t USING vsv(data='1,2,3\n4,5,6', header=off)")
        .unwrap();

    assert_eq!(column_names(&conn, "t"), vec!["c0", "c1", "c2"]);
    let count: i64 = conn.query_row("select count(*) from t", [], |r| r.get(0)).unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_affinity_option() {
    let conn = open();
    conn.execute_batch(
        "CREATE VIRTUAL TABLE t USING vsv(data='n,x\n1,2.5\n10,abc', affinity=numeric)",
    )
    .unwrap();

    assert_eq!(
        query_rows(&conn, "select n, x from t"),
        vec![
            vec![Value::Integer(1), Value::Real(2.5)],
            vec![Value::Integer(10), text("abc")],
        ]
    );
    let total: i64 = conn.query_row("select sum(n) from t", [], |r| r.get(0)).unwrap();
    assert_eq!(total, 11);
}

#[test]
fn test_explicit_schema_sets_column_types() {
    let conn = open();
    conn.execute_batch(
        "CREATE VIRTUAL TABLE t USING vsv(data='1,x', header=off, \
         schema='CREATE TABLE x(num INTEGER, label TEXT)')",
    )
    .unwrap();

    assert_eq!(column_names(&conn, "t"), vec!["num", "label"]);
    assert_eq!(query_rows(&conn, "select num, label from t"), vec![vec![Value::Integer(1), text("x")]]);
}

#[test]
fn test_nulls_and_short_records() {
    let conn = open();
    conn.execute_batch(
        "CREATE VIRTUAL TABLE t USING vsv(data='1,,\"\"\n2', header=off, columns=3, nulls=on)",
    )
    .unwrap();

    assert_eq!(
        query_rows(&conn, "select c0, c1, c2 from t"),
        vec![
            vec![text("1"), Value::Null, text("")],
            vec![text("2"), Value::Null, Value::Null],
        ]
    );
}

#[test]
fn test_short_records_pad_with_empty_text() {
    let conn = open();
    conn.execute_batch("CREATE VIRTUAL TABLE t USING vsv(data='a,b\n1', header=on)")
        .unwrap();

    assert_eq!(query_rows(&conn, "select a, b from t"), vec![vec![text("1"), text("")]]);
}

#[test]
fn test_skip_and_custom_separators() {
    let conn = open();
    conn.execute_batch(
        "CREATE VIRTUAL TABLE t USING vsv(data='# comment;a|b;1|2;3|4', skip=1, fsep='|', rsep=';')",
    )
    .unwrap();

    assert_eq!(column_names(&conn, "t"), vec!["a", "b"]);
    assert_eq!(
        query_rows(&conn, "select a, b from t"),
        vec![vec![text("1"), text("2")], vec![text("3"), text("4")]]
    );
}

#[test]
fn test_tab_separated() {
    let conn = open();
    conn.execute_batch("CREATE VIRTUAL TABLE t USING vsv(data='a\tb\n1\t2', fsep='\\t')")
        .unwrap();

    assert_eq!(query_rows(&conn, "select a, b from t"), vec![vec![text("1"), text("2")]]);
}

#[test]
fn test_rowid_counts_records_from_one() {
    let conn = open();
    conn.execute_batch("CREATE VIRTUAL TABLE t USING vsv(data='v\nx\ny\nz')")
        .unwrap();

    assert_eq!(
        query_rows(&conn, "select rowid, v from t"),
        vec![
            vec![Value::Integer(1), text("x")],
            vec![Value::Integer(2), text("y")],
            vec![Value::Integer(3), text("z")],
        ]
    );
}

#[test]
fn test_rescan_restarts_from_first_record() {
    let conn = open();
    conn.execute_batch("CREATE VIRTUAL TABLE t USING vsv(data='v\n1\n2\n3')")
        .unwrap();

    let pairs: i64 = conn
        .query_row("select count(*) from t as a, t as b", [], |r| r.get(0))
        .unwrap();
    assert_eq!(pairs, 9);
}

#[test]
fn test_table_is_read_only() {
    let conn = open();
    conn.execute_batch("CREATE VIRTUAL TABLE t USING vsv(data='a\n1')")
        .unwrap();

    assert!(conn.execute("insert into t values ('2')", []).is_err());
    assert!(conn.execute("delete from t", []).is_err());
}

#[test]
fn test_missing_file_fails_create() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.csv");
    let conn = open();
    let err = conn
        .execute_batch(&format!("CREATE VIRTUAL TABLE t USING vsv('{}')", missing.display()))
        .unwrap_err();
    assert!(err.to_string().contains("cannot open"));
}

#[test]
fn test_bad_arguments_fail_create() {
    let conn = open();
    assert!(conn
        .execute_batch("CREATE VIRTUAL TABLE t1 USING vsv(data='a', bogus=1)")
        .is_err());
    assert!(conn
        .execute_batch("CREATE VIRTUAL TABLE t2 USING vsv(data='a', header=on, header=off)")
        .is_err());
    assert!(conn
        .execute_batch("CREATE VIRTUAL TABLE t3 USING vsv(data='a', fsep='ab')")
        .is_err());
}

#[test]
fn test_unterminated_quote_fails_scan() {
    let conn = open();
    conn.execute_batch("CREATE VIRTUAL TABLE t USING vsv(data='a\n1\n\"open', header=on)")
        .unwrap();

    let mut stmt = conn.prepare("select a from t").unwrap();
    let result: rusqlite::Result<Vec<String>> =
        stmt.query_map([], |r| r.get(0)).unwrap().collect();
    assert!(result.is_err());
}

#[test]
fn test_interrupt_stops_scan() {
    let conn = open();
    conn.execute_batch("CREATE VIRTUAL TABLE t USING vsv(data='v\n1\n2\n3\n4')")
        .unwrap();

    let interrupt = conn.get_interrupt_handle();
    let mut stmt = conn.prepare("select v from t").unwrap();
    let mut rows = stmt.query([]).unwrap();
    let first: String = rows.next().unwrap().unwrap().get(0).unwrap();
    assert_eq!(first, "1");

    interrupt.interrupt();
    let err = rows.next().unwrap_err();
    assert_eq!(err.sqlite_error_code(), Some(rusqlite::ErrorCode::OperationInterrupted));
}
