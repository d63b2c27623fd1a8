use rusqlite::Connection;
use sqlean::text::{ByteString, RuneString};
use sqlean::Value;

fn open() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    sqlean::text::init(&conn).unwrap();
    conn
}

fn eval(conn: &Connection, sql: &str) -> Value {
    conn.query_row(sql, [], |r| r.get(0)).unwrap()
}

fn text(s: &str) -> Value {
    Value::from(s)
}

#[test]
fn test_codepoint_slicing() {
    let conn = open();
    assert_eq!(eval(&conn, "select text_substring('héllo', 2, 3)"), text("éll"));
    assert_eq!(eval(&conn, "select text_slice('héllo', 2, 5)"), text("éll"));
    assert_eq!(eval(&conn, "select text_left('héllo', 2)"), text("hé"));
    assert_eq!(eval(&conn, "select text_right('héllo', 3)"), text("llo"));
}

#[test]
fn test_search() {
    let conn = open();
    assert_eq!(eval(&conn, "select text_index('héllo héllo', 'llo')"), Value::Integer(3));
    assert_eq!(eval(&conn, "select text_last_index('héllo héllo', 'llo')"), Value::Integer(9));
    assert_eq!(eval(&conn, "select text_contains('hello', 'xyz')"), Value::Integer(0));
    assert_eq!(eval(&conn, "select text_has_prefix('hello', 'he')"), Value::Integer(1));
    assert_eq!(eval(&conn, "select text_has_suffix('hello', 'lo')"), Value::Integer(1));
    assert_eq!(eval(&conn, "select text_count('banana', 'an')"), Value::Integer(2));
}

#[test]
fn test_split_join_and_concat() {
    let conn = open();
    assert_eq!(eval(&conn, "select text_split('one|two|three', '|', 2)"), text("two"));
    assert_eq!(eval(&conn, "select text_split('one|two|three', '|', -1)"), text("three"));
    assert_eq!(eval(&conn, "select text_join('-', 'a', null, 'b', 'c')"), text("a-b-c"));
    assert_eq!(eval(&conn, "select text_concat('a', null, 'b')"), text("ab"));
    assert_eq!(eval(&conn, "select text_repeat('ab', 3)"), text("ababab"));
}

#[test]
fn test_trim_pad_and_replace() {
    let conn = open();
    assert_eq!(eval(&conn, "select text_trim('  hi  ')"), text("hi"));
    assert_eq!(eval(&conn, "select text_ltrim('xxhixx', 'x')"), text("hixx"));
    assert_eq!(eval(&conn, "select text_lpad('7', 3, '0')"), text("007"));
    assert_eq!(eval(&conn, "select text_rpad('ab', 5, 'xy')"), text("abxyx"));
    assert_eq!(eval(&conn, "select text_replace('a-b-c', '-', '+')"), text("a+b+c"));
    assert_eq!(eval(&conn, "select text_replace('a-b-c', '-', '+', 1)"), text("a+b-c"));
    assert_eq!(eval(&conn, "select text_translate('hello', 'el', 'ip')"), text("hippo"));
    assert_eq!(eval(&conn, "select text_reverse('héllo')"), text("olléh"));
}

#[test]
fn test_lengths() {
    let conn = open();
    assert_eq!(eval(&conn, "select text_length('héllo')"), Value::Integer(5));
    assert_eq!(eval(&conn, "select text_size('héllo')"), Value::Integer(6));
    assert_eq!(eval(&conn, "select text_bitsize('héllo')"), Value::Integer(48));
}

#[test]
fn test_null_propagates() {
    let conn = open();
    assert_eq!(eval(&conn, "select text_length(null)"), Value::Null);
    assert_eq!(eval(&conn, "select text_reverse(null)"), Value::Null);
    assert_eq!(eval(&conn, "select text_substring(null, 1, 2)"), Value::Null);
}

#[test]
fn test_argument_errors() {
    let conn = open();
    assert!(conn
        .query_row("select text_split('a|b', '|', 0)", [], |r| r.get::<_, Value>(0))
        .is_err());
    assert!(conn
        .query_row("select text_repeat('a', -1)", [], |r| r.get::<_, Value>(0))
        .is_err());
    assert!(conn.prepare("select text_length()").is_err());
}

#[test]
fn test_oversized_results_are_errors() {
    let conn = open();
    for sql in [
        "select text_repeat('ab', 2305843009213693952)",
        "select text_lpad('x', 1152921504606846976, '0')",
        "select text_rpad('x', 9223372036854775807)",
    ] {
        let err = conn
            .query_row(sql, [], |r| r.get::<_, Value>(0))
            .unwrap_err();
        assert!(err.to_string().contains("too big"), "{}: {}", sql, err);
    }
    assert_eq!(eval(&conn, "select text_repeat('', 9223372036854775807)"), text(""));
}

#[test]
fn test_functions_work_on_table_columns() {
    let conn = open();
    conn.execute_batch(
        "create table words(w text);
         insert into words values ('Straße'), ('naïve'), ('ok');",
    )
    .unwrap();

    let mut stmt = conn
        .prepare("select text_length(w), length(cast(w as blob)) from words order by rowid")
        .unwrap();
    let lengths: Vec<(i64, i64)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(lengths, vec![(6, 7), (5, 6), (2, 2)]);
}

#[test]
fn test_rune_string_api() {
    let s = RuneString::from_cstring("héllo");
    assert_eq!(s.slice(1, 4).to_cstring(), "éll");

    let fill = RuneString::from_cstring("0");
    assert_eq!(RuneString::from_cstring("7").pad_left(3, &fill).to_cstring(), "007");
    let fill = RuneString::from_cstring("xy");
    assert_eq!(RuneString::from_cstring("ab").pad_right(5, &fill).to_cstring(), "abxyx");
}

#[test]
fn test_byte_string_api() {
    let s = ByteString::from_cstring(b"a,b,,c");
    let sep = ByteString::from_cstring(b",");
    assert_eq!(s.count(&sep), 3);
    assert_eq!(s.split_part(&sep, 3).to_cstring(), "c");
    assert!(!s.is_owning());
}
