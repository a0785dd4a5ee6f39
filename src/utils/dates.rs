// src/utils/dates.rs

//! Tolerant timestamp parsing.
//!
//! Feeds, the Crossref API and older store files all disagree on date
//! formats. Every input goes through one ordered list of strategies; the
//! first one that succeeds wins and an input no strategy accepts is treated
//! as absent. Values without an offset are taken as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

type Strategy = fn(&str) -> Option<DateTime<Utc>>;

/// Parse strategies in precedence order.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("rfc3339", parse_rfc3339),
    ("rfc2822", parse_rfc2822),
    ("offset", parse_with_offset),
    ("named-utc", parse_named_utc),
    ("naive", parse_naive_datetime),
    ("date", parse_date_only),
];

const OFFSET_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Parse a timestamp string, returning `None` when no strategy accepts it.
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    STRATEGIES.iter().find_map(|(name, parse)| {
        let parsed = parse(input);
        if parsed.is_some() {
            log::trace!("Parsed {:?} with {} strategy", input, name);
        }
        parsed
    })
}

/// Build a timestamp from Crossref-style date parts (`[year, month, day]`).
///
/// Missing month or day default to 1. A missing or null year yields `None`.
pub fn from_date_parts(parts: &[Option<i32>]) -> Option<DateTime<Utc>> {
    let year = parts.first().copied().flatten()?;
    let month = parts.get(1).copied().flatten().unwrap_or(1);
    let day = parts.get(2).copied().flatten().unwrap_or(1);

    let month = u32::try_from(month).ok()?;
    let day = u32::try_from(day).ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_rfc2822(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_with_offset(s: &str) -> Option<DateTime<Utc>> {
    OFFSET_FORMATS.iter().find_map(|fmt| {
        DateTime::parse_from_str(s, fmt)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

fn parse_named_utc(s: &str) -> Option<DateTime<Utc>> {
    let stripped = ["UTC", "GMT", "Z"]
        .iter()
        .find_map(|suffix| s.strip_suffix(suffix))?;
    parse_naive_datetime(stripped.trim_end())
}

fn parse_naive_datetime(s: &str) -> Option<DateTime<Utc>> {
    NAIVE_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    })
}

fn parse_date_only(s: &str) -> Option<DateTime<Utc>> {
    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    })
}
