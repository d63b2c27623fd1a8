//! Numeric text conversions following SQLite's util.c rules

use crate::error::{Error, ErrorCode, Result};

/// Convert a string to i64.
///
/// Leading and trailing whitespace is ignored; anything else that is not a
/// decimal integer in range is an error.
pub fn atoi64(s: &str) -> Result<i64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(Error::with_message(
            ErrorCode::Argument,
            format!("invalid integer: {}", s),
        ));
    }

    let bytes = trimmed.as_bytes();
    let mut idx = 0usize;
    let mut neg = false;

    if matches!(bytes.get(idx), Some(b'+') | Some(b'-')) {
        neg = bytes[idx] == b'-';
        idx += 1;
    }

    let start_digits = idx;
    let mut value: u128 = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        if !b.is_ascii_digit() {
            break;
        }
        value = value * 10 + (b - b'0') as u128;
        if value > u64::MAX as u128 {
            return Err(Error::with_message(ErrorCode::Argument, "integer overflow"));
        }
        idx += 1;
    }

    if idx == start_digits || idx != bytes.len() {
        return Err(Error::with_message(
            ErrorCode::Argument,
            format!("invalid integer: {}", s),
        ));
    }

    let max = i64::MAX as u128;
    let min_abs = max + 1;
    if neg {
        if value > min_abs {
            return Err(Error::with_message(ErrorCode::Argument, "integer overflow"));
        }
        if value == min_abs {
            return Ok(i64::MIN);
        }
        Ok(-(value as i64))
    } else {
        if value > max {
            return Err(Error::with_message(ErrorCode::Argument, "integer overflow"));
        }
        Ok(value as i64)
    }
}

/// Parse a real number literal: optional sign, digits with an optional
/// fraction, optional exponent. Words like `inf` or `nan` are not numbers.
pub fn parse_real(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    let bytes = trimmed.as_bytes();
    let mut idx = 0usize;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        idx += 1;
    }

    let mut digits = 0usize;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
        digits += 1;
    }
    if idx < bytes.len() && bytes[idx] == b'.' {
        idx += 1;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }
    if idx < bytes.len() && (bytes[idx] == b'e' || bytes[idx] == b'E') {
        idx += 1;
        if matches!(bytes.get(idx), Some(b'+') | Some(b'-')) {
            idx += 1;
        }
        let exp_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == exp_start {
            return None;
        }
    }
    if idx != bytes.len() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Significant digits SQLite keeps when rendering a real as text.
const REAL_DIGITS: i32 = 15;

/// Render a real the way SQLite displays it (`%!.15g`): 15 significant
/// digits, exponent form outside `1e-4..1e15`, and a `.0` on whole numbers.
pub fn real_to_text(r: f64) -> String {
    if r.is_nan() {
        return "NaN".to_string();
    }
    if r.is_infinite() {
        return if r.is_sign_negative() {
            "-Inf".to_string()
        } else {
            "Inf".to_string()
        };
    }

    // exponent after rounding to the kept digits
    let sci = format!("{:.*e}", (REAL_DIGITS - 1) as usize, r);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= REAL_DIGITS {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let fixed = format!("{:.*}", (REAL_DIGITS - 1 - exp) as usize, r);
        trim_fraction(&fixed)
    }
}

/// Drop trailing fraction zeros, keeping at least one digit after the point.
fn trim_fraction(s: &str) -> String {
    match s.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            let fraction = if fraction.is_empty() { "0" } else { fraction };
            format!("{}.{}", whole, fraction)
        }
        None => format!("{}.0", s),
    }
}
