//! Column schema of a vsv table
//!
//! The schema comes from, in order of preference: an explicit `schema=`
//! argument, the header record, `columns=N`, or the field count of the
//! first record. Synthesized columns are named `c0`, `c1`, ...

use rusqlite::vtab::escape_double_quote;

use crate::error::{Error, Result};
use crate::types::{type_affinity, Affinity};

use super::dialect::{dequote, VsvOptions};
use super::reader::{Record, RecordReader};

/// A declared column and the affinity its values are coerced to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub affinity: Affinity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    /// `CREATE TABLE` statement declared to the host.
    pub sql: String,
}

const TABLE_CONSTRAINTS: &[&str] = &["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"];

impl TableSchema {
    /// Schema with the given column names, all sharing one affinity.
    pub fn from_names(names: Vec<String>, affinity: Affinity) -> TableSchema {
        let mut sql = String::from("CREATE TABLE x(");
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('"');
            sql.push_str(&escape_double_quote(name));
            sql.push('"');
            if !affinity.type_name().is_empty() {
                sql.push(' ');
                sql.push_str(affinity.type_name());
            }
        }
        sql.push(')');

        let columns = names
            .into_iter()
            .map(|name| Column { name, affinity })
            .collect();
        TableSchema { columns, sql }
    }

    /// `c0 .. c{count-1}`
    pub fn synthesized(count: usize, affinity: Affinity) -> TableSchema {
        TableSchema::from_names((0..count).map(|i| format!("c{}", i)).collect(), affinity)
    }

    /// Parse an explicit schema: `CREATE TABLE x(...)`, `(...)` or a bare
    /// column list. Declared types set each column's affinity.
    pub fn parse(schema: &str) -> Result<TableSchema> {
        let list = column_list(schema)?;
        let mut columns = Vec::new();
        for item in split_top_level(list)? {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let first_word = item
                .split(|c: char| c.is_whitespace() || c == '(')
                .next()
                .unwrap_or_default()
                .to_ascii_uppercase();
            if TABLE_CONSTRAINTS.contains(&first_word.as_str()) {
                continue;
            }
            let (name, decl_type) = split_column_def(item);
            columns.push(Column {
                name: dequote(name).into_owned(),
                affinity: type_affinity(decl_type),
            });
        }
        if columns.is_empty() {
            return Err(Error::argument(format!("schema declares no columns: {}", schema)));
        }
        Ok(TableSchema {
            columns,
            sql: format!("CREATE TABLE x({})", list.trim()),
        })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Work out the schema for a new table, reading the source if needed.
pub fn derive_schema(options: &VsvOptions) -> Result<TableSchema> {
    let mut reader = RecordReader::new(options.source.open()?, options.dialect.clone());
    if let Some(schema) = &options.schema {
        return TableSchema::parse(schema);
    }

    reader.skip_records(options.skip)?;
    if options.header {
        let record = reader
            .read_record()?
            .ok_or_else(|| Error::argument("cannot read header: source is empty"))?;
        return Ok(TableSchema::from_names(header_names(record), options.affinity));
    }
    if let Some(count) = options.columns {
        return Ok(TableSchema::synthesized(count, options.affinity));
    }
    let record = reader.read_record()?.ok_or_else(|| {
        Error::argument("cannot determine column count: source is empty; use schema= or columns=")
    })?;
    Ok(TableSchema::synthesized(record.len(), options.affinity))
}

/// Column names from a header record. Blank names become `cN`; repeated
/// names get a numeric suffix.
pub fn header_names(record: &Record) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(record.len());
    for (i, field) in record.iter().enumerate() {
        let raw = String::from_utf8_lossy(field);
        let base = match raw.trim() {
            "" => format!("c{}", i),
            name => name.to_string(),
        };
        let mut name = base.clone();
        let mut suffix = 2;
        while names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        names.push(name);
    }
    names
}

fn column_list(schema: &str) -> Result<&str> {
    let s = schema.trim();
    let is_create = s
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("CREATE"));
    if is_create || s.starts_with('(') {
        let open = s
            .find('(')
            .ok_or_else(|| Error::argument(format!("malformed schema: {}", schema)))?;
        let close = s
            .rfind(')')
            .filter(|&close| close > open)
            .ok_or_else(|| Error::argument(format!("malformed schema: {}", schema)))?;
        return Ok(&s[open + 1..close]);
    }
    Ok(s)
}

/// Split on commas outside parentheses and quotes.
fn split_top_level(list: &str) -> Result<Vec<&str>> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '[' => quote = Some(']'),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(Error::argument(format!("unbalanced parentheses in schema: {}", list)));
                    }
                }
                ',' if depth == 0 => {
                    items.push(&list[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(Error::argument(format!("malformed schema: {}", list)));
    }
    items.push(&list[start..]);
    Ok(items)
}

/// Split a column definition into its (possibly quoted) name and the rest.
fn split_column_def(item: &str) -> (&str, &str) {
    let close = match item.chars().next() {
        Some('"') => Some('"'),
        Some('`') => Some('`'),
        Some('\'') => Some('\''),
        Some('[') => Some(']'),
        _ => None,
    };
    let end = match close {
        Some(close) => item[1..].find(close).map_or(item.len(), |pos| pos + 2),
        None => item.find(char::is_whitespace).unwrap_or(item.len()),
    };
    (&item[..end], item[end..].trim())
}
