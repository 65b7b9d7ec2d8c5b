//! ISO-8601 helpers shared by occurrence keys, virtual ids and the string-level
//! recurrence contract.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::error::CoreError;

/// How much of a timestamp an ISO string carried when it was parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoPrecision {
    /// `YYYY-MM-DD`
    Date,
    /// Full RFC 3339 timestamp
    DateTime,
}

/// Canonical ISO form used in every key: UTC, millisecond precision, `Z` suffix.
pub fn to_iso_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Formats `dt` at the given precision.
pub fn format_iso(dt: &DateTime<Utc>, precision: IsoPrecision) -> String {
    match precision {
        IsoPrecision::Date => dt.format("%Y-%m-%d").to_string(),
        IsoPrecision::DateTime => to_iso_string(dt),
    }
}

/// Parses a date-only, naive or RFC 3339 timestamp. Naive values are taken as UTC.
pub fn parse_iso(input: &str) -> Result<(DateTime<Utc>, IsoPrecision), CoreError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok((dt.with_timezone(&Utc), IsoPrecision::DateTime));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok((naive.and_utc(), IsoPrecision::DateTime));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok((date.and_time(chrono::NaiveTime::MIN).and_utc(), IsoPrecision::Date));
    }

    Err(CoreError::InvalidDate(format!("'{}' is not an ISO-8601 date", input)))
}

/// Parses an ISO string and drops the precision.
pub fn parse_iso_datetime(input: &str) -> Result<DateTime<Utc>, CoreError> {
    parse_iso(input).map(|(dt, _)| dt)
}

/// Midnight UTC of the day containing `dt`.
pub fn start_of_day(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}
