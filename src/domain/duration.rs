//! Go-style duration strings (`5s`, `2m`, `1h30m`, `1.5h`)
//!
//! Also accepts `d` and `w` units for bucket TTLs.

use std::time::Duration;

use crate::domain::DomainError;

const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    let n = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SEC,
        "m" => 60 * NANOS_PER_SEC,
        "h" => 3_600 * NANOS_PER_SEC,
        "d" => 86_400 * NANOS_PER_SEC,
        "w" => 7 * 86_400 * NANOS_PER_SEC,
        _ => return None,
    };
    Some(n)
}

/// Parse a duration such as `2m`, `1h30m` or `250ms`.
///
/// A bare `0` is accepted; any other number needs a unit. Negative values are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, DomainError> {
    let err = |reason: &str| DomainError::InvalidDuration {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let s = input.trim();
    if s.is_empty() {
        return Err(err("empty duration"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err(err("negative durations are not allowed"));
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..num_end];
        if number.is_empty() || number == "." {
            return Err(err("expected a number"));
        }
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        if unit.is_empty() {
            return Err(err("missing unit"));
        }
        rest = &rest[unit_end..];

        let scale = unit_nanos(unit).ok_or_else(|| err(&format!("unknown unit {unit:?}")))?;

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if frac.contains('.') {
            return Err(err("malformed number"));
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err("malformed number"))?
        };
        let mut part = whole
            .checked_mul(scale)
            .ok_or_else(|| err("duration overflows"))?;
        if !frac.is_empty() {
            // Digits past nanosecond precision do not change the result.
            let frac = &frac[..frac.len().min(18)];
            let frac_num: u128 = frac.parse().map_err(|_| err("malformed number"))?;
            part += frac_num * scale / 10u128.pow(frac.len() as u32);
        }
        total = total
            .checked_add(part)
            .ok_or_else(|| err("duration overflows"))?;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| err("duration overflows"))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

/// Render a duration the way Go prints `time.Duration` (`2m0s`, `1h0m0s`, `250ms`).
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }

    if d < Duration::from_secs(1) {
        let nanos = d.subsec_nanos();
        return if nanos % 1_000_000 == 0 {
            format!("{}ms", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            format!("{}µs", nanos / 1_000)
        } else {
            format!("{}ns", nanos)
        };
    }

    let total = d.as_secs();
    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let mut seconds = (total % 60).to_string();
    let frac = d.subsec_nanos();
    if frac != 0 {
        let digits = format!("{frac:09}");
        seconds.push('.');
        seconds.push_str(digits.trim_end_matches('0'));
    }

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Serde adapter storing a `Duration` as a duration string.
pub mod serde_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
