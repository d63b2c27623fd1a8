//! Error types and Result aliases for sqlean extensions
//!
//! Every extension reports failures through [`Error`], a result code plus an
//! optional message. Errors cross into the host as `rusqlite::Error` so that
//! SQLite surfaces them through its usual error string.

use std::fmt;

use rusqlite::ffi;

/// Kind of failure, in the spirit of SQLite's primary result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Missing or malformed argument, unknown option, bad schema
    Argument,
    /// Cannot open or read a file
    Io,
    /// Malformed record in a delimited file
    Parse,
    /// Shadow table failure or a function body that does not compile
    Registry,
    /// Out of memory or a value too large to hold
    Resource,
    /// The host interrupted the running statement
    Interrupt,
    /// Error reported by the host engine itself
    Host,
}

impl ErrorCode {
    /// Short description used when no message is attached.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Argument => "invalid argument",
            ErrorCode::Io => "I/O error",
            ErrorCode::Parse => "parse error",
            ErrorCode::Registry => "function registry error",
            ErrorCode::Resource => "string or blob too big",
            ErrorCode::Interrupt => "interrupted",
            ErrorCode::Host => "SQL logic error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every sqlean operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .message.as_deref().unwrap_or(.code.as_str()))]
pub struct Error {
    pub code: ErrorCode,
    pub message: Option<String>,
}

impl Error {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Argument, message)
    }

    pub fn too_big(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Resource, message)
    }

    pub fn registry(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Registry, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

/// Result type alias for sqlean operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::OutOfMemory => Error::with_message(ErrorCode::Resource, err.to_string()),
            _ => Error::with_message(ErrorCode::Io, err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => {
                let code = match failure.code {
                    ffi::ErrorCode::OperationInterrupted => ErrorCode::Interrupt,
                    ffi::ErrorCode::OutOfMemory | ffi::ErrorCode::TooBig => ErrorCode::Resource,
                    _ => ErrorCode::Host,
                };
                Error::with_message(code, err.to_string())
            }
            _ => Error::with_message(ErrorCode::Host, err.to_string()),
        }
    }
}

impl From<Error> for rusqlite::Error {
    fn from(err: Error) -> Self {
        match err.code {
            ErrorCode::Interrupt => rusqlite::Error::SqliteFailure(
                ffi::Error::new(ffi::SQLITE_INTERRUPT),
                Some(err.to_string()),
            ),
            ErrorCode::Resource => rusqlite::Error::SqliteFailure(
                ffi::Error::new(ffi::SQLITE_TOOBIG),
                Some(err.to_string()),
            ),
            _ => rusqlite::Error::UserFunctionError(Box::new(err)),
        }
    }
}
