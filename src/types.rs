//! Core value and affinity types shared by the extensions
//!
//! [`Value`] is the dynamic value every SQL function in this crate receives
//! and returns. It converts to and from the host's value representation at
//! the registration boundary, so extension logic never touches host types.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::util::numeric::{atoi64, parse_real, real_to_text};

// ============================================================================
// SQLite Value Type
// ============================================================================

/// Dynamic SQLite value (sqlite3_value)
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// NULL value
    #[default]
    Null,
    /// Integer value (64-bit signed)
    Integer(i64),
    /// Real/float value (64-bit IEEE 754)
    Real(f64),
    /// Text value (UTF-8 string)
    Text(String),
    /// Binary large object
    Blob(Vec<u8>),
}

impl Value {
    /// Convert to i64 with SQLite coercion rules
    ///
    /// - NULL -> 0
    /// - Integer -> value
    /// - Real -> truncated to integer
    /// - Text -> integer or truncated real when the whole text is numeric, else 0
    /// - Blob -> 0
    pub fn to_i64(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Integer(i) => *i,
            Value::Real(f) => *f as i64,
            Value::Text(s) => atoi64(s)
                .ok()
                .or_else(|| parse_real(s).map(|r| r as i64))
                .unwrap_or(0),
            Value::Blob(_) => 0,
        }
    }

    /// Convert to string with SQLite coercion rules
    ///
    /// - NULL -> empty string
    /// - Integer -> decimal representation
    /// - Real -> decimal representation, always with a fractional part
    /// - Text -> value
    /// - Blob -> interpreted as UTF-8 (lossy)
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => real_to_text(*f),
            Value::Text(s) => s.clone(),
            Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    /// Check if value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text of a non-NULL value, `None` for NULL.
    pub fn as_text(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_text())
        }
    }

    /// Borrow the host view of this value.
    pub fn as_value_ref(&self) -> ValueRef<'_> {
        match self {
            Value::Null => ValueRef::Null,
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(f) => ValueRef::Real(*f),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(Value::from(value))
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(self.as_value_ref()))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

// ============================================================================
// Type Affinity
// ============================================================================

/// Column type affinity (Section 3.1 of SQLite docs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Affinity {
    /// BLOB affinity (no type coercion)
    #[default]
    Blob,
    /// TEXT affinity
    Text,
    /// NUMERIC affinity (prefers integer, then real)
    Numeric,
    /// INTEGER affinity
    Integer,
    /// REAL affinity
    Real,
}

impl Affinity {
    /// Declared type written into generated schemas, empty for BLOB.
    pub fn type_name(self) -> &'static str {
        match self {
            Affinity::Blob => "",
            Affinity::Text => "TEXT",
            Affinity::Numeric => "NUMERIC",
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
        }
    }

    /// Parse an affinity keyword as accepted by `affinity=` options.
    ///
    /// `none` is an alias for BLOB.
    pub fn from_keyword(keyword: &str) -> Option<Affinity> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "none" | "blob" => Some(Affinity::Blob),
            "text" => Some(Affinity::Text),
            "numeric" => Some(Affinity::Numeric),
            "integer" | "int" => Some(Affinity::Integer),
            "real" => Some(Affinity::Real),
            _ => None,
        }
    }
}

/// Determine column affinity from type name (Section 3.1.1 of SQLite docs)
///
/// 1. If type contains "INT" -> INTEGER
/// 2. If type contains "CHAR", "CLOB", or "TEXT" -> TEXT
/// 3. If type contains "BLOB" or is empty -> BLOB
/// 4. If type contains "REAL", "FLOA", or "DOUB" -> REAL
/// 5. Otherwise -> NUMERIC
pub fn type_affinity(type_name: &str) -> Affinity {
    let upper = type_name.to_uppercase();

    if upper.contains("INT") {
        return Affinity::Integer;
    }

    if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        return Affinity::Text;
    }

    if upper.contains("BLOB") || type_name.trim().is_empty() {
        return Affinity::Blob;
    }

    if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        return Affinity::Real;
    }

    Affinity::Numeric
}

/// Apply affinity to a value, the way SQLite converts a value stored into
/// a column of that affinity.
pub fn apply_affinity(value: Value, affinity: Affinity) -> Value {
    match affinity {
        Affinity::Blob => value,
        Affinity::Text => match value {
            Value::Integer(i) => Value::Text(i.to_string()),
            Value::Real(r) => Value::Text(real_to_text(r)),
            other => other,
        },
        Affinity::Integer | Affinity::Numeric => match value {
            Value::Text(s) => match text_to_numeric(&s) {
                Some(number) => number,
                None => Value::Text(s),
            },
            Value::Real(r) => real_to_exact_integer(r).unwrap_or(Value::Real(r)),
            other => other,
        },
        Affinity::Real => match value {
            Value::Text(s) => match parse_real(&s) {
                Some(r) => Value::Real(r),
                None => Value::Text(s),
            },
            Value::Integer(i) => Value::Real(i as f64),
            other => other,
        },
    }
}

/// Convert text that looks like a number into an INTEGER or REAL value.
fn text_to_numeric(s: &str) -> Option<Value> {
    if let Ok(i) = atoi64(s) {
        return Some(Value::Integer(i));
    }
    parse_real(s).map(|r| real_to_exact_integer(r).unwrap_or(Value::Real(r)))
}

fn real_to_exact_integer(r: f64) -> Option<Value> {
    // Bounds exclude i64::MAX as f64 (2^63), which does not fit.
    if r.fract() == 0.0 && r >= -9.223_372_036_854_775e18 && r < 9.223_372_036_854_775e18 {
        Some(Value::Integer(r as i64))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_affinity() {
        assert_eq!(type_affinity("INT"), Affinity::Integer);
        assert_eq!(type_affinity("BIGINT"), Affinity::Integer);
        assert_eq!(type_affinity("VARCHAR(20)"), Affinity::Text);
        assert_eq!(type_affinity(""), Affinity::Blob);
        assert_eq!(type_affinity("DOUBLE PRECISION"), Affinity::Real);
        assert_eq!(type_affinity("DECIMAL(10,2)"), Affinity::Numeric);
    }

    #[test]
    fn test_apply_affinity() {
        assert_eq!(
            apply_affinity(Value::from("123"), Affinity::Integer),
            Value::Integer(123)
        );
        assert_eq!(
            apply_affinity(Value::from("1.5"), Affinity::Integer),
            Value::Real(1.5)
        );
        assert_eq!(
            apply_affinity(Value::from("3.0"), Affinity::Numeric),
            Value::Integer(3)
        );
        assert_eq!(
            apply_affinity(Value::from("abc"), Affinity::Integer),
            Value::from("abc")
        );
        assert_eq!(
            apply_affinity(Value::from(" 2.5 "), Affinity::Real),
            Value::Real(2.5)
        );
        assert_eq!(
            apply_affinity(Value::Integer(7), Affinity::Text),
            Value::from("7")
        );
        assert_eq!(
            apply_affinity(Value::from("42"), Affinity::Blob),
            Value::from("42")
        );
    }

    #[test]
    fn test_value_coercion() {
        assert_eq!(Value::from("12abc").to_i64(), 0);
        assert_eq!(Value::from("2.9").to_i64(), 2);
        assert_eq!(Value::Real(2.0).to_text(), "2.0");
        assert_eq!(Value::Null.as_text(), None);
    }
}
