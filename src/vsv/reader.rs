//! Streaming record parser for delimited text
//!
//! One record is parsed per call. Field bytes live in a buffer owned by the
//! reader and are overwritten by the next call, so a [`Record`] borrowed
//! from the reader cannot be held across an advance.

use std::io::BufRead;

use crate::error::{Error, ErrorCode, Result};
use crate::utf::UTF8_BOM;

use super::dialect::{Dialect, RecordSeparator};

#[derive(Debug, Clone, Copy)]
struct FieldSpan {
    start: usize,
    end: usize,
    quoted: bool,
}

/// The fields of one record.
#[derive(Debug, Default)]
pub struct Record {
    buf: Vec<u8>,
    fields: Vec<FieldSpan>,
    line: u64,
}

impl Record {
    fn clear(&mut self) {
        self.buf.clear();
        self.fields.clear();
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&[u8]> {
        self.fields.get(idx).map(|f| &self.buf[f.start..f.end])
    }

    /// Whether field `idx` was enclosed in quotes.
    pub fn is_quoted(&self, idx: usize) -> bool {
        self.fields.get(idx).is_some_and(|f| f.quoted)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.fields.iter().map(|f| &self.buf[f.start..f.end])
    }

    /// Line the record starts on, 1-based.
    pub fn line(&self) -> u64 {
        self.line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    QuotedQuote,
    RecordEnd,
}

#[derive(Debug, Clone, Copy)]
enum Token {
    Eof,
    Fsep,
    Quote,
    /// Record separator and the raw bytes it was spelled with.
    Rsep([u8; 2], usize),
    Byte(u8),
}

/// Reads [`Record`]s from a byte stream under a [`Dialect`].
pub struct RecordReader<R> {
    input: R,
    dialect: Dialect,
    record: Record,
    /// Bytes pushed back, read before the input. Last in, first out.
    pending: Vec<u8>,
    line: u64,
    records: u64,
    started: bool,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(input: R, dialect: Dialect) -> Self {
        RecordReader {
            input,
            dialect,
            record: Record::default(),
            pending: Vec::new(),
            line: 1,
            records: 0,
            started: false,
            done: false,
        }
    }

    /// The record produced by the last successful [`read_record`](Self::read_record).
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Records parsed so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.pending.pop() {
            return Ok(Some(b));
        }
        let first = self.input.fill_buf()?.first().copied();
        match first {
            Some(b) => {
                self.input.consume(1);
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        let b = match self.next_byte()? {
            Some(b) => b,
            None => return Ok(Token::Eof),
        };
        if Some(b) == self.dialect.quote {
            return Ok(Token::Quote);
        }
        if b == self.dialect.fsep {
            return Ok(Token::Fsep);
        }
        match self.dialect.rsep {
            RecordSeparator::Newline if b == b'\n' => {
                self.line += 1;
                Ok(Token::Rsep([b'\n', 0], 1))
            }
            RecordSeparator::Newline if b == b'\r' => {
                self.line += 1;
                match self.next_byte()? {
                    Some(b'\n') => Ok(Token::Rsep([b'\r', b'\n'], 2)),
                    other => {
                        self.pending.extend(other);
                        Ok(Token::Rsep([b'\r', 0], 1))
                    }
                }
            }
            RecordSeparator::Byte(sep) if b == sep => {
                if b == b'\n' {
                    self.line += 1;
                }
                Ok(Token::Rsep([b, 0], 1))
            }
            _ => {
                if b == b'\n' {
                    self.line += 1;
                }
                Ok(Token::Byte(b))
            }
        }
    }

    /// Consume a leading UTF-8 byte order mark. Bytes are read one at a
    /// time, so a mark split across buffer refills is still found.
    fn skip_bom(&mut self) -> Result<()> {
        let mut matched = 0;
        while matched < UTF8_BOM.len() {
            match self.next_byte()? {
                Some(b) if b == UTF8_BOM[matched] => matched += 1,
                other => {
                    self.pending.extend(other);
                    self.pending.extend(UTF8_BOM[..matched].iter().rev());
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, start: usize, quoted: bool) {
        self.record.fields.push(FieldSpan {
            start,
            end: self.record.buf.len(),
            quoted,
        });
    }

    fn parse_error(&self, line: u64, what: &str) -> Error {
        Error::with_message(ErrorCode::Parse, format!("line {}: {}", line, what))
    }

    /// Parse the next record. Returns `None` at end of input.
    pub fn read_record(&mut self) -> Result<Option<&Record>> {
        if !self.started {
            self.skip_bom()?;
            self.started = true;
        }
        if self.done {
            return Ok(None);
        }

        self.record.clear();
        self.record.line = self.line;
        let relaxed = self.dialect.relaxed;
        let mut state = State::FieldStart;
        let mut start = 0usize;

        while state != State::RecordEnd {
            let token = self.next_token()?;
            state = match (state, token) {
                (State::FieldStart, Token::Eof) => {
                    self.done = true;
                    if self.record.is_empty() {
                        return Ok(None);
                    }
                    // "a,b," ends with an empty field
                    self.emit(start, false);
                    State::RecordEnd
                }
                (State::FieldStart, Token::Quote) => State::Quoted,
                (State::FieldStart, Token::Fsep) => {
                    self.emit(start, false);
                    start = self.record.buf.len();
                    State::FieldStart
                }
                (State::FieldStart, Token::Rsep(..)) => {
                    self.emit(start, false);
                    State::RecordEnd
                }
                (State::FieldStart, Token::Byte(b)) => {
                    self.record.buf.push(b);
                    State::Unquoted
                }

                (State::Unquoted, Token::Eof) => {
                    self.done = true;
                    self.emit(start, false);
                    State::RecordEnd
                }
                (State::Unquoted, Token::Fsep) => {
                    self.emit(start, false);
                    start = self.record.buf.len();
                    State::FieldStart
                }
                (State::Unquoted, Token::Rsep(..)) => {
                    self.emit(start, false);
                    State::RecordEnd
                }
                (State::Unquoted, Token::Quote) => {
                    if !relaxed {
                        return Err(self.parse_error(self.line, "unexpected quote in unquoted field"));
                    }
                    self.push_quote();
                    State::Unquoted
                }
                (State::Unquoted, Token::Byte(b)) => {
                    self.record.buf.push(b);
                    State::Unquoted
                }

                (State::Quoted, Token::Eof) => {
                    if !relaxed {
                        return Err(self.parse_error(self.record.line, "unterminated quoted field"));
                    }
                    self.done = true;
                    self.emit(start, true);
                    State::RecordEnd
                }
                (State::Quoted, Token::Quote) => State::QuotedQuote,
                (State::Quoted, Token::Fsep) => {
                    self.record.buf.push(self.dialect.fsep);
                    State::Quoted
                }
                (State::Quoted, Token::Rsep(raw, len)) => {
                    self.record.buf.extend_from_slice(&raw[..len]);
                    State::Quoted
                }
                (State::Quoted, Token::Byte(b)) => {
                    self.record.buf.push(b);
                    State::Quoted
                }

                (State::QuotedQuote, Token::Eof) => {
                    self.done = true;
                    self.emit(start, true);
                    State::RecordEnd
                }
                (State::QuotedQuote, Token::Quote) => {
                    self.push_quote();
                    State::Quoted
                }
                (State::QuotedQuote, Token::Fsep) => {
                    self.emit(start, true);
                    start = self.record.buf.len();
                    State::FieldStart
                }
                (State::QuotedQuote, Token::Rsep(..)) => {
                    self.emit(start, true);
                    State::RecordEnd
                }
                (State::QuotedQuote, Token::Byte(b)) => {
                    if !relaxed {
                        return Err(self.parse_error(self.line, "unexpected character after closing quote"));
                    }
                    self.record.buf.push(b);
                    State::Unquoted
                }

                (State::RecordEnd, _) => State::RecordEnd,
            };
        }

        self.records += 1;
        Ok(Some(&self.record))
    }

    fn push_quote(&mut self) {
        if let Some(q) = self.dialect.quote {
            self.record.buf.push(q);
        }
    }

    /// Skip `n` records; stops early at end of input.
    pub fn skip_records(&mut self, n: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < n && self.read_record()?.is_some() {
            skipped += 1;
        }
        Ok(skipped)
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use super::*;

    fn parse_with(input: &str, dialect: Dialect) -> Result<Vec<Vec<String>>> {
        let mut reader = RecordReader::new(input.as_bytes(), dialect);
        let mut rows = Vec::new();
        while let Some(record) = reader.read_record()? {
            rows.push(
                record
                    .iter()
                    .map(|f| String::from_utf8_lossy(f).into_owned())
                    .collect(),
            );
        }
        Ok(rows)
    }

    fn parse(input: &str) -> Vec<Vec<String>> {
        parse_with(input, Dialect::default()).unwrap()
    }

    fn relaxed() -> Dialect {
        Dialect {
            relaxed: true,
            ..Dialect::default()
        }
    }

    #[test]
    fn test_simple_records() {
        assert_eq!(
            parse("id,name\n1,a\n2,b\n"),
            vec![vec!["id", "name"], vec!["1", "a"], vec!["2", "b"]]
        );
        assert_eq!(parse("x,y"), vec![vec!["x", "y"]]);
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_quoted_fields() {
        assert_eq!(parse("a,b\n\"x,y\",z\n")[1], vec!["x,y", "z"]);
        assert_eq!(parse("a\n\"he said \"\"hi\"\"\"\n")[1], vec!["he said \"hi\""]);
        assert_eq!(parse("\"line1\nline2\",x\n")[0], vec!["line1\nline2", "x"]);
        assert_eq!(parse("\"\",\"\"\n")[0], vec!["", ""]);
    }

    #[test]
    fn test_quoted_flag() {
        let mut reader = RecordReader::new(&b"\"a\",b\n"[..], Dialect::default());
        let record = reader.read_record().unwrap().unwrap();
        assert!(record.is_quoted(0));
        assert!(!record.is_quoted(1));
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(parse("a,,c\n"), vec![vec!["a", "", "c"]]);
        assert_eq!(parse(",\n"), vec![vec!["", ""]]);
        assert_eq!(parse("a,b,"), vec![vec!["a", "b", ""]]);
        assert_eq!(parse("a\n\nb\n"), vec![vec!["a"], vec![""], vec!["b"]]);
    }

    #[test]
    fn test_newline_variants() {
        let lf = parse("a,b\n1,2\n3,4\n");
        assert_eq!(parse("a,b\r\n1,2\r\n3,4\r\n"), lf);
        assert_eq!(parse("a,b\r1,2\r3,4\r"), lf);
        assert_eq!(parse("a,b\r\n1,2\n3,4"), lf);
    }

    #[test]
    fn test_bom_stripped() {
        assert_eq!(parse("\u{FEFF}id,name\n")[0], vec!["id", "name"]);
        assert_eq!(parse("\u{FEFF}"), Vec::<Vec<String>>::new());
        // a lone BOM mid-file is data
        assert_eq!(parse("a\n\u{FEFF}b\n")[1], vec!["\u{FEFF}b"]);
    }

    #[test]
    fn test_bom_split_across_reads() {
        let input = "\u{FEFF}a,b\n1,2".as_bytes();
        let mut reader = RecordReader::new(BufReader::with_capacity(1, input), Dialect::default());
        let header: Vec<&[u8]> = reader.read_record().unwrap().unwrap().iter().collect();
        assert_eq!(header, vec![&b"a"[..], &b"b"[..]]);
        assert_eq!(reader.read_record().unwrap().unwrap().get(1), Some(&b"2"[..]));
    }

    #[test]
    fn test_partial_bom_is_kept() {
        let input = &b"\xEF\xBBx,y\n"[..];
        let mut reader = RecordReader::new(BufReader::with_capacity(1, input), Dialect::default());
        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(record.get(0), Some(&b"\xEF\xBBx"[..]));
        assert_eq!(record.get(1), Some(&b"y"[..]));

        let mut reader = RecordReader::new(&b"\xEF"[..], Dialect::default());
        assert_eq!(reader.read_record().unwrap().unwrap().get(0), Some(&b"\xEF"[..]));
    }

    #[test]
    fn test_custom_separators() {
        let dialect = Dialect {
            fsep: b'\t',
            rsep: RecordSeparator::Byte(b';'),
            ..Dialect::default()
        };
        let rows = parse_with("a\tb;c\td\ne;", dialect).unwrap();
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d\ne"]]);

        let no_quotes = Dialect {
            quote: None,
            ..Dialect::default()
        };
        let rows = parse_with("\"a\",b\n", no_quotes).unwrap();
        assert_eq!(rows, vec![vec!["\"a\"", "b"]]);
    }

    #[test]
    fn test_strict_errors() {
        let err = parse_with("a,b\nx\"y,z\n", Dialect::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Parse);
        assert!(err.to_string().starts_with("line 2:"));

        let err = parse_with("a\n\"open\n", Dialect::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Parse);
        assert!(err.to_string().contains("unterminated"));

        assert!(parse_with("\"a\"b\n", Dialect::default()).is_err());
    }

    #[test]
    fn test_relaxed() {
        let rows = parse_with("x\"y,z\n", relaxed()).unwrap();
        assert_eq!(rows, vec![vec!["x\"y", "z"]]);
        let rows = parse_with("a,\"open", relaxed()).unwrap();
        assert_eq!(rows, vec![vec!["a", "open"]]);
        let rows = parse_with("\"a\"b,c\n", relaxed()).unwrap();
        assert_eq!(rows, vec![vec!["ab", "c"]]);
    }

    #[test]
    fn test_reemission_is_fixed_point() {
        let input = "plain,\"with,comma\",\"with \"\"quote\"\"\",\"multi\nline\"\n";
        let first = parse(input);
        let canonical: Vec<String> = first[0]
            .iter()
            .map(|f| {
                if f.contains(',') || f.contains('"') || f.contains('\n') || f.contains('\r') {
                    format!("\"{}\"", f.replace('"', "\"\""))
                } else {
                    f.clone()
                }
            })
            .collect();
        let again = parse(&format!("{}\n", canonical.join(",")));
        assert_eq!(again, first);
    }

    #[test]
    fn test_skip_records_and_counts() {
        let mut reader = RecordReader::new(&b"# comment\nid\n1\n2\n"[..], Dialect::default());
        assert_eq!(reader.skip_records(1).unwrap(), 1);
        assert_eq!(reader.read_record().unwrap().unwrap().get(0), Some(&b"id"[..]));
        assert_eq!(reader.record().line(), 2);
        assert_eq!(reader.skip_records(10).unwrap(), 2);
        assert_eq!(reader.records_read(), 4);
        assert!(reader.read_record().unwrap().is_none());
    }
}
