use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_english::{parse_date_string, Dialect};
use homekeep_core::dates::{parse_iso, start_of_day};

/// Parses a user-supplied date ("tomorrow", "next friday", "2024-03-01") and
/// normalizes it to midnight UTC, since chores are scheduled by day.
pub fn parse_due_date(date_str: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok((parsed, _)) = parse_iso(date_str) {
        return Ok(start_of_day(parsed));
    }
    parse_date_string(date_str, now, Dialect::Us)
        .map(start_of_day)
        .map_err(|e| anyhow::anyhow!("Failed to parse date '{}': {}", date_str, e))
}
