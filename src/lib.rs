//! sqlean - SQLite extensions rewritten in Rust
//!
//! - `vsv`: delimited text files as read-only virtual tables
//! - `text`: rune and byte aware string functions
//! - `define`: user-defined functions written in SQL, stored in the database
//!
//! ```no_run
//! let conn = rusqlite::Connection::open_in_memory()?;
//! sqlean::register(&conn)?;
//! # Ok::<(), sqlean::Error>(())
//! ```

pub mod error;
pub mod functions;
pub mod types;
pub mod utf;
pub mod util;

#[cfg(feature = "define")]
pub mod define;
#[cfg(feature = "text")]
pub mod text;
#[cfg(feature = "vsv")]
pub mod vsv;

use lazy_static::lazy_static;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use tracing::debug;

// Re-export main public types
pub use error::{Error, ErrorCode, Result};
pub use types::{Affinity, Value};

/// Version of the sqlean bundle these extensions follow.
pub const VERSION: &str = "0.21.6";

bitflags::bitflags! {
    /// Extensions selected for registration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Extensions: u8 {
        /// Delimited text virtual tables
        const VSV    = 0x01;
        /// Text functions
        const TEXT   = 0x02;
        /// Persistent user-defined functions
        const DEFINE = 0x04;
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Extensions::all()
    }
}

type InitFn = fn(&Connection) -> Result<()>;

struct Extension {
    flag: Extensions,
    name: &'static str,
    init: InitFn,
}

#[cfg(feature = "define")]
fn init_define(conn: &Connection) -> Result<()> {
    define::init(conn).map(|_| ())
}

lazy_static! {
    static ref EXTENSIONS: Vec<Extension> = {
        #[allow(unused_mut)]
        let mut table = Vec::new();
        #[cfg(feature = "vsv")]
        table.push(Extension { flag: Extensions::VSV, name: "vsv", init: vsv::init });
        #[cfg(feature = "text")]
        table.push(Extension { flag: Extensions::TEXT, name: "text", init: text::init });
        #[cfg(feature = "define")]
        table.push(Extension { flag: Extensions::DEFINE, name: "define", init: init_define });
        table
    };
}

/// The bundle version, as returned by `sqlean_version()`.
pub fn version() -> &'static str {
    VERSION
}

/// Names of the extensions compiled into this build.
pub fn available() -> Vec<&'static str> {
    EXTENSIONS.iter().map(|ext| ext.name).collect()
}

/// Register every compiled extension on a connection.
pub fn register(conn: &Connection) -> Result<()> {
    register_with(conn, Extensions::all())
}

/// Register the selected extensions on a connection. Extensions not
/// compiled into this build are skipped.
pub fn register_with(conn: &Connection, selected: Extensions) -> Result<()> {
    conn.create_scalar_function(
        "sqlean_version",
        0,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC | FunctionFlags::SQLITE_INNOCUOUS,
        |_| Ok(VERSION),
    )?;

    for ext in EXTENSIONS.iter().filter(|ext| selected.contains(ext.flag)) {
        (ext.init)(conn)?;
        debug!(extension = ext.name, "extension registered");
    }
    Ok(())
}
