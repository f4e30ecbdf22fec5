//! Lenient date parsing for feed items.
//!
//! Journals publish dates in whatever shape their CMS emits: RFC 2822 in
//! `pubDate`, ISO 8601 in `dc:date`, bare dates, or long-hand English. Each
//! shape is one parser in [`DATE_PARSERS`], tried in order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::model::UNKNOWN_DATE;

type DateParser = fn(&str) -> Option<DateTime<Utc>>;

const DATE_PARSERS: &[DateParser] = &[
    parse_rfc2822,
    parse_rfc3339,
    parse_offset_datetime,
    parse_naive_datetime,
    parse_naive_date,
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%a, %d %b %Y",
];

/// Parse a date string in any of the supported shapes, as a UTC instant.
/// Dates without a time are taken as midnight UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == UNKNOWN_DATE {
        return None;
    }
    DATE_PARSERS.iter().find_map(|parse| parse(raw))
}

/// Reduce a raw item date to `YYYY-MM-DD`.
///
/// Absent dates become [`UNKNOWN_DATE`]; strings that don't parse are kept
/// verbatim so the reader still sees what the journal published.
pub fn normalize_date(raw: Option<&str>) -> String {
    match raw {
        None => UNKNOWN_DATE.to_string(),
        Some(raw) => match parse_date(raw) {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => raw.to_string(),
        },
    }
}

fn parse_rfc2822(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date.with_timezone(&Utc));
    }
    // Some feeds publish a weekday that doesn't match the date
    let (_, rest) = raw.split_once(", ")?;
    DateTime::parse_from_rfc2822(rest)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn parse_offset_datetime(raw: &str) -> Option<DateTime<Utc>> {
    OFFSET_DATETIME_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(raw, format).ok())
        .map(|date| date.with_timezone(&Utc))
}

fn parse_naive_datetime(raw: &str) -> Option<DateTime<Utc>> {
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|date| date.and_utc())
}

fn parse_naive_date(raw: &str) -> Option<DateTime<Utc>> {
    NAIVE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}
