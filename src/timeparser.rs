//! Graphite-style time strings
//!
//! Accepted forms for `from`/`until`:
//!
//! ```text
//! 1700000000          unix seconds
//! 04:0020231105       HH:MMYYYYMMDD in the configured location
//! now                 current time (whole seconds)
//! now-1d, -2h30min    now plus one or more signed offsets
//! ```
//!
//! Offset units are matched by prefix: `s|sec`, `min`, `h|hour`, `d|day`,
//! `w|week`, `mon|month`, `y|year`.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use nom::{
    character::complete::{alpha1, digit1, one_of},
    combinator::opt,
    IResult, Parser,
};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Normalize raw input: lowercase, trim, drop `_`, `,` and spaces
fn normalize(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '_' | ',' | ' '))
        .collect()
}

/// Parse an absolute or relative time into unix seconds
pub fn parse_at_time(input: &str, now: DateTime<Utc>, location: &FixedOffset) -> Result<i64> {
    let s = normalize(input);
    if s.is_empty() {
        return Err(Error::time_parser(input, "empty time"));
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse::<i64>()
            .map_err(|e| Error::time_parser(input, e.to_string()));
    }

    if s.contains(':') && s.len() == 13 {
        return parse_clock_date(input, &s, location);
    }

    let (reference, offset) = match s.find(['+', '-']) {
        Some(idx) => s.split_at(idx),
        None => (s.as_str(), ""),
    };

    if !reference.is_empty() && reference != "now" {
        return Err(Error::time_parser(
            input,
            format!("unknown reference {reference:?}"),
        ));
    }

    let base = now.timestamp();
    if offset.is_empty() {
        return Ok(base);
    }
    base.checked_add(parse_offset_normalized(input, offset)?)
        .ok_or_else(|| Error::time_parser(input, "time out of range"))
}

/// Parse an offset such as `-1d`, `20s` or `1h30min` into signed seconds
pub fn parse_time_offset(input: &str) -> Result<i64> {
    let s = normalize(input);
    if s.is_empty() {
        return Err(Error::time_parser(input, "empty offset"));
    }
    parse_offset_normalized(input, &s)
}

fn parse_offset_normalized(input: &str, s: &str) -> Result<i64> {
    let mut rest = s;
    let mut sign = 1i64;
    let mut total = 0i64;

    while !rest.is_empty() {
        let (next, (explicit_sign, digits, unit)) = offset_segment(rest)
            .map_err(|_| Error::time_parser(input, format!("malformed offset at {rest:?}")))?;
        if let Some(c) = explicit_sign {
            sign = if c == '-' { -1 } else { 1 };
        }
        let amount: i64 = digits
            .parse()
            .map_err(|_| Error::time_parser(input, format!("invalid number {digits:?}")))?;
        let unit_seconds = unit_to_seconds(unit)
            .ok_or_else(|| Error::time_parser(input, format!("unknown unit {unit:?}")))?;
        let delta = amount
            .checked_mul(unit_seconds)
            .and_then(|d| d.checked_mul(sign))
            .ok_or_else(|| Error::time_parser(input, "offset overflows"))?;
        total = total
            .checked_add(delta)
            .ok_or_else(|| Error::time_parser(input, "offset overflows"))?;
        rest = next;
    }

    Ok(total)
}

fn offset_segment(input: &str) -> IResult<&str, (Option<char>, &str, &str)> {
    (opt(one_of("+-")), digit1, alpha1).parse(input)
}

fn unit_to_seconds(unit: &str) -> Option<i64> {
    if unit.starts_with('s') {
        Some(1)
    } else if unit.starts_with("min") {
        Some(MINUTE)
    } else if unit.starts_with('h') {
        Some(HOUR)
    } else if unit.starts_with('d') {
        Some(DAY)
    } else if unit.starts_with('w') {
        Some(WEEK)
    } else if unit.starts_with("mon") {
        Some(MONTH)
    } else if unit.starts_with('y') {
        Some(YEAR)
    } else {
        None
    }
}

/// `HH:MMYYYYMMDD`
fn parse_clock_date(input: &str, s: &str, location: &FixedOffset) -> Result<i64> {
    let field = |range: std::ops::Range<usize>| -> Result<u32> {
        s.get(range)
            .and_then(|f| f.parse::<u32>().ok())
            .ok_or_else(|| Error::time_parser(input, "expected HH:MMYYYYMMDD"))
    };
    if s.as_bytes().get(2) != Some(&b':') {
        return Err(Error::time_parser(input, "expected HH:MMYYYYMMDD"));
    }
    let hour = field(0..2)?;
    let minute = field(3..5)?;
    let year = field(5..9)? as i32;
    let month = field(9..11)?;
    let day = field(11..13)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| Error::time_parser(input, "date out of range"))?;

    location
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| Error::time_parser(input, "ambiguous local time"))
}

/// Parse a location: `UTC`, `Z`, or a fixed offset like `+09:00` / `-0530`
pub fn parse_location(input: &str) -> Result<FixedOffset> {
    let s = input.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("utc") || s == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(|| Error::time_parser(input, "invalid UTC"));
    }

    let (sign, rest) = match s.as_bytes()[0] {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => {
            return Err(Error::time_parser(
                input,
                "expected UTC or an offset like +09:00",
            ))
        }
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::time_parser(input, "expected an offset like +09:00"));
    }
    let hours: i32 = digits[0..2]
        .parse()
        .map_err(|_| Error::time_parser(input, "invalid hours"))?;
    let minutes: i32 = digits[2..4]
        .parse()
        .map_err(|_| Error::time_parser(input, "invalid minutes"))?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| Error::time_parser(input, "offset out of range"))
}
