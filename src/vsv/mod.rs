//! vsv: delimited text files as read-only virtual tables
//!
//! ```sql
//! CREATE VIRTUAL TABLE people USING vsv('people.csv', header=on, affinity=integer);
//! SELECT * FROM people;
//! ```
//!
//! Rows are parsed lazily, one record per cursor step, in file order.

pub mod dialect;
pub mod reader;
pub mod schema;
pub mod table;

use rusqlite::vtab::read_only_module;
use rusqlite::Connection;
use tracing::debug;

pub use dialect::{Dialect, RecordSeparator, Source, VsvOptions};
pub use reader::{Record, RecordReader};
pub use schema::{Column, TableSchema};
pub use table::{VsvCursor, VsvTab};

use crate::error::Result;

/// Module name used in `CREATE VIRTUAL TABLE ... USING vsv(...)`.
pub const MODULE_NAME: &str = "vsv";

/// Register the vsv module on a connection.
pub fn init(conn: &Connection) -> Result<()> {
    conn.create_module(MODULE_NAME, read_only_module::<VsvTab>(), None)?;
    debug!("vsv module registered");
    Ok(())
}
