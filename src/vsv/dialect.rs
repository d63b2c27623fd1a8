//! vsv table options and the delimited-text dialect they describe

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::vtab::parse_boolean;

use crate::error::{Error, ErrorCode, Result};
use crate::types::Affinity;

/// What ends a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordSeparator {
    /// `\n`, `\r\n` and a bare `\r` all end a record.
    #[default]
    Newline,
    /// Only this byte ends a record.
    Byte(u8),
}

/// Field separator, record separator, quote character and quoting policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub fsep: u8,
    pub rsep: RecordSeparator,
    /// `None` disables quoting.
    pub quote: Option<u8>,
    /// Accept lone quotes in unquoted fields and an unterminated quote at EOF.
    pub relaxed: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect {
            fsep: b',',
            rsep: RecordSeparator::Newline,
            quote: Some(b'"'),
            relaxed: false,
        }
    }
}

impl Dialect {
    /// True when `b` ends a record under this dialect.
    pub fn is_record_separator(&self, b: u8) -> bool {
        match self.rsep {
            RecordSeparator::Newline => b == b'\n' || b == b'\r',
            RecordSeparator::Byte(sep) => b == sep,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.is_record_separator(self.fsep) {
            return Err(Error::argument("fsep and rsep must differ"));
        }
        if let Some(q) = self.quote {
            if q == self.fsep || self.is_record_separator(q) {
                return Err(Error::argument("dquote must differ from fsep and rsep"));
            }
        }
        Ok(())
    }
}

/// Where the table's text comes from.
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    Data(Arc<[u8]>),
}

impl Source {
    /// Open a fresh reader positioned at the start of the text.
    pub fn open(&self) -> Result<Box<dyn BufRead>> {
        match self {
            Source::File(path) => {
                let file = File::open(path).map_err(|e| {
                    Error::with_message(
                        ErrorCode::Io,
                        format!("cannot open '{}': {}", path.display(), e),
                    )
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
            Source::Data(data) => Ok(Box::new(io::Cursor::new(Arc::clone(data)))),
        }
    }
}

/// Parsed `CREATE VIRTUAL TABLE ... USING vsv(...)` arguments.
#[derive(Debug, Clone)]
pub struct VsvOptions {
    pub source: Source,
    pub schema: Option<String>,
    pub columns: Option<usize>,
    pub header: bool,
    pub skip: u64,
    pub dialect: Dialect,
    /// Affinity of columns named by the header or synthesized.
    pub affinity: Affinity,
    pub nulls: bool,
}

const BOOLEAN_OPTIONS: &[&str] = &["header", "nulls", "relaxed"];

impl VsvOptions {
    /// Parse module arguments, excluding the module, database and table names.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<VsvOptions> {
        let mut seen: Vec<String> = Vec::new();
        let mut positional = 0usize;

        let mut filename: Option<String> = None;
        let mut data: Option<String> = None;
        let mut schema: Option<String> = None;
        let mut columns: Option<usize> = None;
        let mut header = true;
        let mut skip = 0u64;
        let mut dialect = Dialect::default();
        let mut affinity = Affinity::Blob;
        let mut nulls = false;

        for arg in args {
            let arg = arg.as_ref().trim();
            let (key, value) = match split_parameter(arg) {
                Some((key, value)) => (key.to_ascii_lowercase(), dequote(value)),
                None if BOOLEAN_OPTIONS.contains(&arg.to_ascii_lowercase().as_str()) => {
                    (arg.to_ascii_lowercase(), Cow::Borrowed("on"))
                }
                None => {
                    positional += 1;
                    let key = match positional {
                        1 => "filename",
                        2 => "schema",
                        _ => return Err(Error::argument(format!("unexpected argument: {}", arg))),
                    };
                    (key.to_string(), dequote(arg))
                }
            };

            if seen.contains(&key) {
                return Err(Error::argument(format!("more than one '{}' parameter", key)));
            }
            seen.push(key.clone());

            match key.as_str() {
                "filename" => filename = Some(value.into_owned()),
                "data" => data = Some(value.into_owned()),
                "schema" => schema = Some(value.into_owned()),
                "columns" => {
                    let n = parse_count(&key, &value)?;
                    if n == 0 {
                        return Err(Error::argument("columns must be positive"));
                    }
                    columns = Some(n as usize);
                }
                "header" => header = parse_flag(&key, &value)?,
                "skip" => skip = parse_count(&key, &value)?,
                "fsep" => dialect.fsep = parse_fsep(&value)?,
                "rsep" => dialect.rsep = parse_rsep(&value)?,
                "dquote" => dialect.quote = parse_quote(&value)?,
                "affinity" => {
                    affinity = Affinity::from_keyword(&value)
                        .ok_or_else(|| Error::argument(format!("unknown affinity: '{}'", value)))?
                }
                "nulls" => nulls = parse_flag(&key, &value)?,
                "relaxed" => dialect.relaxed = parse_flag(&key, &value)?,
                _ => return Err(Error::argument(format!("unrecognized parameter '{}'", key))),
            }
        }

        let source = match (filename, data) {
            (Some(path), None) => Source::File(PathBuf::from(path)),
            (None, Some(text)) => Source::Data(Arc::from(text.into_bytes())),
            (Some(_), Some(_)) => {
                return Err(Error::argument("must specify either filename= or data= but not both"))
            }
            (None, None) => return Err(Error::argument("must specify either filename= or data=")),
        };
        dialect.validate()?;

        Ok(VsvOptions {
            source,
            schema,
            columns,
            header,
            skip,
            dialect,
            affinity,
            nulls,
        })
    }
}

/// `key=value` with an identifier key, `None` for anything else.
fn split_parameter(arg: &str) -> Option<(&str, &str)> {
    let (key, value) = arg.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((key, value.trim()))
}

/// Strip one level of SQL quoting, undoubling embedded quotes.
pub fn dequote(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return Cow::Borrowed(s);
    }
    let q = bytes[0];
    let close = match q {
        b'\'' | b'"' | b'`' => q,
        b'[' => b']',
        _ => return Cow::Borrowed(s),
    };
    if bytes[bytes.len() - 1] != close {
        return Cow::Borrowed(s);
    }
    let inner = &s[1..s.len() - 1];
    if q == b'[' {
        return Cow::Borrowed(inner);
    }
    let quote = q as char;
    let doubled: String = [quote, quote].iter().collect();
    if inner.contains(&doubled) {
        Cow::Owned(inner.replace(&doubled, &quote.to_string()))
    } else {
        Cow::Borrowed(inner)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    parse_boolean(value)
        .ok_or_else(|| Error::argument(format!("'{}' must be a boolean, got '{}'", key, value)))
}

fn parse_count(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::argument(format!("'{}' must be a non-negative integer, got '{}'", key, value)))
}

/// Decode `\t \n \r \\ \xHH` escapes.
pub fn unescape(value: &str) -> Result<Vec<u8>> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match bytes[i + 1] {
            b't' => out.push(b'\t'),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b'\\' => out.push(b'\\'),
            b'x' => {
                let hex = value
                    .get(i + 2..i + 4)
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| Error::argument(format!("bad \\x escape in '{}'", value)))?;
                out.push(hex);
                i += 4;
                continue;
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
        i += 2;
    }
    Ok(out)
}

fn parse_fsep(value: &str) -> Result<u8> {
    match unescape(value)?.as_slice() {
        [b] => Ok(*b),
        _ => Err(Error::argument(format!("fsep must be a single character, got '{}'", value))),
    }
}

fn parse_rsep(value: &str) -> Result<RecordSeparator> {
    match unescape(value)?.as_slice() {
        b"\n" | b"\r" | b"\r\n" => Ok(RecordSeparator::Newline),
        [b] => Ok(RecordSeparator::Byte(*b)),
        _ => Err(Error::argument(format!("rsep must be a newline or a single character, got '{}'", value))),
    }
}

fn parse_quote(value: &str) -> Result<Option<u8>> {
    match unescape(value)?.as_slice() {
        [] => Ok(None),
        [b] => Ok(Some(*b)),
        _ => Err(Error::argument(format!("dquote must be a single character, got '{}'", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let options = VsvOptions::parse(&["'data.csv'"]).unwrap();
        assert!(matches!(options.source, Source::File(ref p) if p == &PathBuf::from("data.csv")));
        assert!(options.header);
        assert!(!options.nulls);
        assert_eq!(options.skip, 0);
        assert_eq!(options.dialect, Dialect::default());
        assert_eq!(options.affinity, Affinity::Blob);
    }

    #[test]
    fn test_parse_named() {
        let options = VsvOptions::parse(&[
            "filename='x.tsv'",
            "fsep='\\t'",
            "rsep=';'",
            "dquote=''",
            "header=off",
            "nulls",
            "relaxed=yes",
            "skip=2",
            "columns=3",
            "affinity=integer",
        ])
        .unwrap();
        assert_eq!(options.dialect.fsep, b'\t');
        assert_eq!(options.dialect.rsep, RecordSeparator::Byte(b';'));
        assert_eq!(options.dialect.quote, None);
        assert!(options.dialect.relaxed);
        assert!(!options.header);
        assert!(options.nulls);
        assert_eq!(options.skip, 2);
        assert_eq!(options.columns, Some(3));
        assert_eq!(options.affinity, Affinity::Integer);
    }

    #[test]
    fn test_parse_positional_schema() {
        let options = VsvOptions::parse(&["f.csv", "(a INT, b TEXT)"]).unwrap();
        assert_eq!(options.schema.as_deref(), Some("(a INT, b TEXT)"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(VsvOptions::parse::<&str>(&[]).is_err());
        assert!(VsvOptions::parse(&["a.csv", "data='x'"]).is_err());
        assert!(VsvOptions::parse(&["a.csv", "bogus=1"]).is_err());
        assert!(VsvOptions::parse(&["a.csv", "header=on", "header=off"]).is_err());
        assert!(VsvOptions::parse(&["a.csv", "header=maybe"]).is_err());
        assert!(VsvOptions::parse(&["a.csv", "fsep=',,'"]).is_err());
        assert!(VsvOptions::parse(&["a.csv", "fsep='\"'"]).is_err());
        assert!(VsvOptions::parse(&["a.csv", "affinity=date"]).is_err());
        let err = VsvOptions::parse(&["a.csv", "skip=-1"]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Argument);
    }

    #[test]
    fn test_dequote() {
        assert_eq!(dequote("'it''s'"), "it's");
        assert_eq!(dequote("\"x\""), "x");
        assert_eq!(dequote("[col]"), "col");
        assert_eq!(dequote("plain"), "plain");
        assert_eq!(dequote("'"), "'");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("\\t").unwrap(), b"\t");
        assert_eq!(unescape("\\r\\n").unwrap(), b"\r\n");
        assert_eq!(unescape("\\x1f").unwrap(), vec![0x1f]);
        assert_eq!(unescape("\\\\").unwrap(), b"\\");
        assert_eq!(unescape("|").unwrap(), b"|");
        assert!(unescape("\\xZZ").is_err());
    }
}
