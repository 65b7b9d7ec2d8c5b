use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Validate IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz> {
    Tz::from_str(timezone).map_err(|_| {
        anyhow!(
            "Invalid timezone: '{}'. Use IANA timezone names like 'America/New_York'",
            timezone
        )
    })
}

/// Detect system timezone
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if !tz.is_empty() && validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    if let Ok(tz) = iana_time_zone::get_timezone() {
        if validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    "UTC".to_string()
}

/// The zone dates are displayed in: the configured one, else the system's.
pub fn display_timezone(configured: Option<&str>) -> Result<Tz> {
    match configured.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => validate_timezone(name),
        None => validate_timezone(&detect_system_timezone()),
    }
}

/// Calendar date of `dt` in `tz`, e.g. `Fri 2024-03-01`.
pub fn format_local_date(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%a %Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case("UTC")]
    #[case("America/New_York")]
    #[case("Europe/Istanbul")]
    fn test_valid_timezones(#[case] name: &str) {
        assert!(validate_timezone(name).is_ok());
    }

    #[rstest]
    #[case("Mars/Olympus_Mons")]
    #[case("EST5EDT/Nope")]
    fn test_invalid_timezones(#[case] name: &str) {
        assert!(validate_timezone(name).is_err());
    }

    #[test]
    fn test_configured_zone_wins() {
        assert_eq!(display_timezone(Some("Asia/Tokyo")).unwrap(), chrono_tz::Asia::Tokyo);
        assert!(display_timezone(Some("Nowhere/Land")).is_err());
        assert!(display_timezone(None).is_ok());
    }

    #[test]
    fn test_format_local_date_crosses_midnight() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        assert_eq!(format_local_date(&dt, chrono_tz::UTC), "Fri 2024-03-01");
        assert_eq!(format_local_date(&dt, chrono_tz::America::New_York), "Thu 2024-02-29");
    }
}
