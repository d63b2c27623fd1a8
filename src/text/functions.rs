//! text_* SQL functions
//!
//! Positions are 1-based as in SQL and count characters, except where a
//! function is documented to work on bytes. A NULL string argument yields
//! NULL.

use super::bstring::ByteString;
use super::rstring::RuneString;
use crate::error::{Error, Result};
use crate::functions::{check_min_args, FunctionDef};
use crate::types::Value;

/// Every function of the text extension.
pub const TEXT_FUNCTIONS: &[FunctionDef] = &[
    FunctionDef::fixed("text_substring", 2, 3, func_substring),
    FunctionDef::fixed("text_slice", 2, 3, func_slice),
    FunctionDef::fixed("text_left", 2, 2, func_left),
    FunctionDef::fixed("text_right", 2, 2, func_right),
    FunctionDef::fixed("text_index", 2, 2, func_index),
    FunctionDef::fixed("text_last_index", 2, 2, func_last_index),
    FunctionDef::fixed("text_contains", 2, 2, func_contains),
    FunctionDef::fixed("text_has_prefix", 2, 2, func_has_prefix),
    FunctionDef::fixed("text_has_suffix", 2, 2, func_has_suffix),
    FunctionDef::fixed("text_count", 2, 2, func_count),
    FunctionDef::fixed("text_split", 3, 3, func_split),
    FunctionDef::variadic("text_concat", 1, func_concat),
    FunctionDef::variadic("text_join", 2, func_join),
    FunctionDef::fixed("text_repeat", 2, 2, func_repeat),
    FunctionDef::fixed("text_ltrim", 1, 2, func_ltrim),
    FunctionDef::fixed("text_rtrim", 1, 2, func_rtrim),
    FunctionDef::fixed("text_trim", 1, 2, func_trim),
    FunctionDef::fixed("text_lpad", 2, 3, func_lpad),
    FunctionDef::fixed("text_rpad", 2, 3, func_rpad),
    FunctionDef::fixed("text_replace", 3, 4, func_replace),
    FunctionDef::fixed("text_translate", 3, 3, func_translate),
    FunctionDef::fixed("text_reverse", 1, 1, func_reverse),
    FunctionDef::fixed("text_length", 1, 1, func_length),
    FunctionDef::fixed("text_size", 1, 1, func_size),
    FunctionDef::fixed("text_bitsize", 1, 1, func_bitsize),
];

// ============================================================================
// Argument helpers
// ============================================================================

/// Text of argument `idx`, `None` when NULL or absent.
fn text_arg(args: &[Value], idx: usize) -> Option<String> {
    args.get(idx).and_then(Value::as_text)
}

/// Integer argument that must not be negative.
fn count_arg(args: &[Value], idx: usize, what: &str) -> Result<usize> {
    let n = args.get(idx).map_or(0, Value::to_i64);
    usize::try_from(n).map_err(|_| Error::argument(format!("{} parameter should be >= 0", what)))
}

/// Largest result a function may build, in bytes. Matches SQLite's
/// default `SQLITE_MAX_LENGTH`.
pub const MAX_RESULT_SIZE: usize = 1_000_000_000;

/// Fail with a Resource error when `size` units of `unit` bytes would not
/// fit in a result.
fn check_size(size: usize, unit: usize) -> Result<()> {
    match size.checked_mul(unit) {
        Some(bytes) if bytes <= MAX_RESULT_SIZE => Ok(()),
        _ => Err(Error::too_big("string or blob too big")),
    }
}

/// Optional text argument: `default` when absent, `None` when NULL.
fn optional_text(args: &[Value], idx: usize, default: &str) -> Option<String> {
    match args.get(idx) {
        None => Some(default.to_string()),
        Some(v) => v.as_text(),
    }
}

fn text_result(s: &RuneString<'_>) -> Value {
    Value::Text(s.to_cstring())
}

fn bytes_result(s: &ByteString<'_>) -> Value {
    Value::Text(s.to_cstring())
}

macro_rules! text_or_null {
    ($args:expr, $idx:expr) => {
        match text_arg($args, $idx) {
            Some(s) => s,
            None => return Ok(Value::Null),
        }
    };
}

macro_rules! int_or_null {
    ($args:expr, $idx:expr) => {
        match $args.get($idx) {
            Some(v) if !v.is_null() => v.to_i64(),
            _ => return Ok(Value::Null),
        }
    };
}

// ============================================================================
// Substrings
// ============================================================================

/// text_substring(str, start [, length])
///
/// A start before the first character still consumes length, the way
/// PostgreSQL's substring() does.
pub fn func_substring(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let start = int_or_null!(args, 1);
    let rs = RuneString::from_cstring(&s);
    let mut length = if args.len() > 2 {
        let length = int_or_null!(args, 2);
        if length < 0 {
            return Err(Error::argument("length parameter should be >= 0"));
        }
        length
    } else {
        rs.length() as i64
    };

    let mut begin = start.saturating_sub(1);
    if begin < 0 {
        length = length.saturating_add(begin);
        begin = 0;
    }
    if length <= 0 {
        return Ok(Value::Text(String::new()));
    }
    Ok(text_result(&rs.slice(begin, begin.saturating_add(length))))
}

/// text_slice(str, start [, end]): end is exclusive, negative positions
/// count from the end.
pub fn func_slice(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let start = int_or_null!(args, 1);
    let rs = RuneString::from_cstring(&s);
    let end = if args.len() > 2 {
        int_or_null!(args, 2)
    } else {
        rs.length() as i64 + 1
    };
    let start = if start > 0 { start - 1 } else { start };
    let end = if end > 0 { end - 1 } else { end };
    Ok(text_result(&rs.slice(start, end)))
}

/// text_left(str, n): first n characters, or all but the last -n.
pub fn func_left(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let n = int_or_null!(args, 1);
    let rs = RuneString::from_cstring(&s);
    Ok(text_result(&rs.slice(0, n)))
}

/// text_right(str, n): last n characters, or all but the first -n.
pub fn func_right(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let n = int_or_null!(args, 1);
    let rs = RuneString::from_cstring(&s);
    let len = rs.length() as i64;
    let start = if n >= 0 {
        len.saturating_sub(n).max(0)
    } else {
        n.saturating_neg()
    };
    Ok(text_result(&rs.slice(start, len)))
}

// ============================================================================
// Search
// ============================================================================

pub fn func_index(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let other = text_or_null!(args, 1);
    let idx = RuneString::from_cstring(&s).index(&RuneString::from_cstring(&other));
    Ok(Value::Integer(idx + 1))
}

pub fn func_last_index(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let other = text_or_null!(args, 1);
    let idx = RuneString::from_cstring(&s).last_index(&RuneString::from_cstring(&other));
    Ok(Value::Integer(idx + 1))
}

pub fn func_contains(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let other = text_or_null!(args, 1);
    let found = ByteString::from_cstring(s.as_bytes())
        .contains(&ByteString::from_cstring(other.as_bytes()));
    Ok(Value::from(found))
}

pub fn func_has_prefix(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let other = text_or_null!(args, 1);
    let found = ByteString::from_cstring(s.as_bytes())
        .has_prefix(&ByteString::from_cstring(other.as_bytes()));
    Ok(Value::from(found))
}

pub fn func_has_suffix(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let other = text_or_null!(args, 1);
    let found = ByteString::from_cstring(s.as_bytes())
        .has_suffix(&ByteString::from_cstring(other.as_bytes()));
    Ok(Value::from(found))
}

pub fn func_count(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let other = text_or_null!(args, 1);
    let count = ByteString::from_cstring(s.as_bytes())
        .count(&ByteString::from_cstring(other.as_bytes()));
    Ok(Value::Integer(count as i64))
}

// ============================================================================
// Split and join
// ============================================================================

/// text_split(str, sep, n): n-th part, negative n counts from the end.
pub fn func_split(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let sep = text_or_null!(args, 1);
    let part = int_or_null!(args, 2);
    if part == 0 {
        return Err(Error::argument("part parameter should not be 0"));
    }
    let bs = ByteString::from_cstring(s.as_bytes());
    let sep = ByteString::from_cstring(sep.as_bytes());
    let idx = if part > 0 {
        part - 1
    } else {
        let parts = bs.count(&sep) as i64 + 1;
        parts + part
    };
    if idx < 0 {
        return Ok(Value::Text(String::new()));
    }
    let idx = usize::try_from(idx).unwrap_or(usize::MAX);
    Ok(bytes_result(&bs.split_part(&sep, idx)))
}

/// text_concat(str, ...): NULL arguments are skipped.
pub fn func_concat(args: &[Value]) -> Result<Value> {
    check_min_args("text_concat", args, 1)?;
    let texts: Vec<String> = args.iter().filter_map(Value::as_text).collect();
    let parts: Vec<ByteString<'_>> = texts
        .iter()
        .map(|t| ByteString::from_cstring(t.as_bytes()))
        .collect();
    Ok(bytes_result(&ByteString::concat(&parts)))
}

/// text_join(sep, str, ...): NULL strings are skipped.
pub fn func_join(args: &[Value]) -> Result<Value> {
    check_min_args("text_join", args, 2)?;
    let sep = text_or_null!(args, 0);
    let texts: Vec<String> = args[1..].iter().filter_map(Value::as_text).collect();
    let parts: Vec<ByteString<'_>> = texts
        .iter()
        .map(|t| ByteString::from_cstring(t.as_bytes()))
        .collect();
    let joined = ByteString::join(&parts, &ByteString::from_cstring(sep.as_bytes()));
    Ok(bytes_result(&joined))
}

pub fn func_repeat(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    if args[1].is_null() {
        return Ok(Value::Null);
    }
    let count = count_arg(args, 1, "count")?;
    check_size(count, s.len())?;
    let bs = ByteString::from_cstring(s.as_bytes());
    Ok(bytes_result(&bs.repeat(count)))
}

// ============================================================================
// Trim and pad
// ============================================================================

fn trim_with(args: &[Value], op: fn(&RuneString<'_>, &RuneString<'_>) -> String) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let chars = match optional_text(args, 1, " ") {
        Some(chars) => chars,
        None => return Ok(Value::Null),
    };
    let result = op(&RuneString::from_cstring(&s), &RuneString::from_cstring(&chars));
    Ok(Value::Text(result))
}

pub fn func_ltrim(args: &[Value]) -> Result<Value> {
    trim_with(args, |s, chars| s.trim_left(chars).to_cstring())
}

pub fn func_rtrim(args: &[Value]) -> Result<Value> {
    trim_with(args, |s, chars| s.trim_right(chars).to_cstring())
}

pub fn func_trim(args: &[Value]) -> Result<Value> {
    trim_with(args, |s, chars| s.trim(chars).to_cstring())
}

/// Strings longer than the target length are cut to it before padding.
fn pad_with(
    args: &[Value],
    op: fn(&RuneString<'_>, usize, &RuneString<'_>) -> String,
) -> Result<Value> {
    let s = text_or_null!(args, 0);
    if args[1].is_null() {
        return Ok(Value::Null);
    }
    let length = count_arg(args, 1, "length")?;
    check_size(length, std::mem::size_of::<char>())?;
    let fill = match optional_text(args, 2, " ") {
        Some(fill) => fill,
        None => return Ok(Value::Null),
    };
    let rs = RuneString::from_cstring(&s);
    let cut = rs.substring(0, length);
    Ok(Value::Text(op(&cut, length, &RuneString::from_cstring(&fill))))
}

pub fn func_lpad(args: &[Value]) -> Result<Value> {
    pad_with(args, |s, length, fill| s.pad_left(length, fill).to_cstring())
}

pub fn func_rpad(args: &[Value]) -> Result<Value> {
    pad_with(args, |s, length, fill| s.pad_right(length, fill).to_cstring())
}

// ============================================================================
// Transforms
// ============================================================================

/// text_replace(str, old, new [, count])
pub fn func_replace(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let old = text_or_null!(args, 1);
    let new = text_or_null!(args, 2);
    let max_count = if args.len() > 3 {
        if args[3].is_null() {
            return Ok(Value::Null);
        }
        count_arg(args, 3, "count")?
    } else {
        usize::MAX
    };
    let bs = ByteString::from_cstring(s.as_bytes());
    let old = ByteString::from_cstring(old.as_bytes());
    let new = ByteString::from_cstring(new.as_bytes());
    if new.length() > old.length() {
        let grows = bs.count(&old).min(max_count);
        check_size(grows, new.length() - old.length())?;
        check_size(s.len() + grows * (new.length() - old.length()), 1)?;
    }
    let replaced = bs.replace(&old, &new, max_count);
    Ok(bytes_result(&replaced))
}

pub fn func_translate(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    let from = text_or_null!(args, 1);
    let to = text_or_null!(args, 2);
    let rs = RuneString::from_cstring(&s);
    let translated = rs.translate(&RuneString::from_cstring(&from), &RuneString::from_cstring(&to));
    Ok(text_result(&translated))
}

pub fn func_reverse(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    Ok(text_result(&RuneString::from_cstring(&s).reverse()))
}

// ============================================================================
// Properties
// ============================================================================

pub fn func_length(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    Ok(Value::Integer(RuneString::from_cstring(&s).length() as i64))
}

pub fn func_size(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    Ok(Value::Integer(s.len() as i64))
}

pub fn func_bitsize(args: &[Value]) -> Result<Value> {
    let s = text_or_null!(args, 0);
    Ok(Value::Integer(s.len() as i64 * 8))
}
