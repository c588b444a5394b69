//! Record parsing: one line into `(key, value)`.
//!
//! A record is `<key>;<value>` with the terminator already stripped by the
//! caller. The key is everything before the first delimiter byte and is
//! returned as a borrowed slice; the value is parsed as a decimal number.
//!
//! # Value Grammar
//!
//! The expected value domain is fixed-precision readings: an optional leading
//! minus, one or two integer digits, a decimal point, and exactly one
//! fractional digit (`-?[0-9]{1,2}\.[0-9]`). That shape is parsed on the fast
//! path as integer tenths with no allocation and no float parsing machinery.
//!
//! Values outside the fixed grammar fall back to the standard general decimal
//! parser (digits with an optional leading sign and at most one fractional
//! separator), so integer-only readings like `7` still aggregate as `7.0`.
//! A value rejected by both paths is a malformed record, never a silent zero.

use memchr::memchr;

use crate::errors::RecordError;

/// Record delimiter byte between key and value.
pub const DELIMITER: u8 = b';';

/// Parses one line (terminator excluded) into `(key_bytes, value)`.
///
/// The key may be empty; key bytes are not inspected further here. Equality
/// and ordering of keys downstream are byte-wise.
#[inline]
pub fn parse_record(line: &[u8]) -> Result<(&[u8], f64), RecordError> {
    let delim = memchr(DELIMITER, line).ok_or(RecordError::MissingDelimiter)?;
    let key = &line[..delim];
    let value = parse_value(&line[delim + 1..])?;
    Ok((key, value))
}

/// Parses a value: fixed-precision fast path, general fallback.
#[inline]
pub fn parse_value(bytes: &[u8]) -> Result<f64, RecordError> {
    if let Some(v) = parse_fixed(bytes) {
        return Ok(v);
    }
    parse_general(bytes)
}

/// Fast path for `-?[0-9]{1,2}\.[0-9]`, computed as integer tenths.
#[inline]
fn parse_fixed(bytes: &[u8]) -> Option<f64> {
    let (neg, digits) = match bytes.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, bytes),
    };

    let tenths = match *digits {
        [a @ b'0'..=b'9', b'.', c @ b'0'..=b'9'] => (a - b'0') as i32 * 10 + (c - b'0') as i32,
        [a @ b'0'..=b'9', b @ b'0'..=b'9', b'.', c @ b'0'..=b'9'] => {
            (a - b'0') as i32 * 100 + (b - b'0') as i32 * 10 + (c - b'0') as i32
        }
        _ => return None,
    };

    let v = tenths as f64 / 10.0;
    Some(if neg { -v } else { v })
}

/// General fallback: optional sign, ASCII digits, at most one `.`.
///
/// The shape is validated byte-wise before handing off to `f64::from_str`,
/// which keeps non-numeric forms the float parser would accept (`inf`,
/// `NaN`, exponents) out of the aggregate.
fn parse_general(bytes: &[u8]) -> Result<f64, RecordError> {
    let digits = match bytes.split_first() {
        Some((b'-' | b'+', rest)) => rest,
        _ => bytes,
    };
    if digits.is_empty() {
        return Err(RecordError::BadValue);
    }

    let mut seen_dot = false;
    let mut seen_digit = false;
    for &b in digits {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => return Err(RecordError::BadValue),
        }
    }
    if !seen_digit {
        return Err(RecordError::BadValue);
    }

    // The bytes are validated ASCII at this point.
    let text = std::str::from_utf8(bytes).map_err(|_| RecordError::BadValue)?;
    text.parse::<f64>().map_err(|_| RecordError::BadValue)
}
