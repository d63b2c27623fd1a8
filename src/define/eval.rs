//! eval(): run one SQL statement and return its values as text

use rusqlite::Connection;

use crate::error::Result;
use crate::types::Value;

/// Separator placed between values when none is given.
pub const DEFAULT_SEPARATOR: &str = " ";

/// Run `sql` and join every non-NULL value of every row with `sep`.
///
/// Returns NULL when the statement produces no values, including for
/// statements that return no rows at all.
pub fn eval(conn: &Connection, sql: &str, sep: &str) -> Result<Value> {
    let mut stmt = conn.prepare(sql)?;
    let columns = stmt.column_count();
    let mut rows = stmt.query([])?;

    let mut values: Vec<String> = Vec::new();
    while let Some(row) = rows.next()? {
        for i in 0..columns {
            let value: Value = row.get(i)?;
            if let Some(text) = value.as_text() {
                values.push(text);
            }
        }
    }

    if values.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Text(values.join(sep)))
    }
}
