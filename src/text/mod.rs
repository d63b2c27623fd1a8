//! Text extension: codepoint and byte strings, and the text_* functions.

pub mod bstring;
pub mod functions;
pub mod rstring;
pub mod runes;

use rusqlite::Connection;
use tracing::debug;

pub use bstring::ByteString;
pub use functions::TEXT_FUNCTIONS;
pub use rstring::RuneString;
pub use runes::{runes_from_cstring, runes_to_cstring};

use crate::error::Result;
use crate::functions::register_functions;

/// Register the text_* functions on a connection.
pub fn init(conn: &Connection) -> Result<()> {
    register_functions(conn, TEXT_FUNCTIONS)?;
    debug!("text extension registered");
    Ok(())
}
