//! Textual durations (`"100ms"`, `"1h30m"`, `"1.5s"`).
//!
//! Grammar: an optional sign, then one or more `<decimal><unit>` groups. The bare
//! string `"0"` needs no unit. Negative durations are accepted and clamp to zero so
//! a countdown built from them fires immediately.

use std::time::Duration;

use thiserror::Error;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;
const MAX_NANOS: u64 = i64::MAX as u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("time: invalid duration \"{0}\"")]
    Invalid(String),
    #[error("time: missing unit in duration \"{0}\"")]
    MissingUnit(String),
    #[error("time: unknown unit \"{unit}\" in duration \"{input}\"")]
    UnknownUnit { unit: String, input: String },
}

fn unit_nanos(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Consume leading ASCII digits, returning the accumulated value (or `None` on
/// overflow) and the number of bytes consumed.
fn leading_int(s: &str) -> (Option<u64>, usize) {
    let mut value: Option<u64> = Some(0);
    let mut consumed = 0;
    for b in s.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        value = value
            .and_then(|v| v.checked_mul(10))
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .filter(|v| *v <= MAX_NANOS);
        consumed += 1;
    }
    (value, consumed)
}

/// Consume a fractional digit run. Digits past the precision we can hold are
/// skipped rather than treated as overflow.
fn leading_fraction(s: &str) -> (u64, f64, usize) {
    let mut value: u64 = 0;
    let mut scale: f64 = 1.0;
    let mut overflow = false;
    let mut consumed = 0;
    for b in s.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        consumed += 1;
        if overflow {
            continue;
        }
        match value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .filter(|v| *v <= MAX_NANOS)
        {
            Some(next) => {
                value = next;
                scale *= 10.0;
            }
            None => overflow = true,
        }
    }
    (value, scale, consumed)
}

pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());

    let mut rest = input;
    let mut negative = false;
    if let Some(stripped) = rest.strip_prefix('-') {
        negative = true;
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    while !rest.is_empty() {
        let first = rest.as_bytes()[0];
        if !(first == b'.' || first.is_ascii_digit()) {
            return Err(invalid());
        }

        let (whole, int_len) = leading_int(rest);
        let whole = whole.ok_or_else(invalid)?;
        let has_int = int_len > 0;
        rest = &rest[int_len..];

        let mut fraction = 0;
        let mut scale = 1.0;
        let mut has_fraction = false;
        if let Some(after_dot) = rest.strip_prefix('.') {
            let (f, s, frac_len) = leading_fraction(after_dot);
            fraction = f;
            scale = s;
            has_fraction = frac_len > 0;
            rest = &after_dot[frac_len..];
        }
        if !has_int && !has_fraction {
            return Err(invalid());
        }

        let unit_len = rest
            .char_indices()
            .find(|(_, c)| *c == '.' || c.is_ascii_digit())
            .map_or(rest.len(), |(idx, _)| idx);
        if unit_len == 0 {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let unit_str = &rest[..unit_len];
        let unit = unit_nanos(unit_str).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit_str.to_string(),
            input: input.to_string(),
        })?;
        rest = &rest[unit_len..];

        let mut group = whole
            .checked_mul(unit)
            .filter(|v| *v <= MAX_NANOS)
            .ok_or_else(invalid)?;
        if fraction > 0 {
            let extra = (fraction as f64 * (unit as f64 / scale)) as u64;
            group = group
                .checked_add(extra)
                .filter(|v| *v <= MAX_NANOS)
                .ok_or_else(invalid)?;
        }
        total = total
            .checked_add(group)
            .filter(|v| *v <= MAX_NANOS)
            .ok_or_else(invalid)?;
    }

    if negative {
        return Ok(Duration::ZERO);
    }
    Ok(Duration::from_nanos(total))
}
