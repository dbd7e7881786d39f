//! Broker timestamp formats.
//!
//! The broker writes times as exchange-local text with an optional trailing
//! zone name (`20230629 10:30:00 US/Eastern`). Everything the gateway
//! publishes is converted to one reporting zone.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const DATE_FORMAT: &str = "%Y%m%d";
const DATE_TIME_FORMAT: &str = "%Y%m%d %H:%M:%S";
const CANCEL_TIME_FORMAT: &str = "%Y%m%d-%H:%M:%S";

/// Parse a broker date or timestamp into the reporting zone.
///
/// Accepted forms:
/// - `YYYYMMDD`: midnight in the reporting zone.
/// - epoch seconds.
/// - `YYYYMMDD HH:MM:SS Zone`: localized in `Zone`, then converted.
/// - `YYYYMMDD HH:MM:SS`: read in the reporting zone. Unknown zone names
///   fall back to this as well.
#[must_use]
pub fn parse_broker_time(text: &str, reporting: Tz) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();

    if text.len() <= 8 {
        let date = NaiveDate::parse_from_str(text, DATE_FORMAT).ok()?;
        return localize(date.and_hms_opt(0, 0, 0)?, reporting, reporting);
    }

    if text.bytes().all(|b| b.is_ascii_digit()) {
        let seconds: i64 = text.parse().ok()?;
        let utc = Utc.timestamp_opt(seconds, 0).single()?;
        return Some(utc.with_timezone(&reporting).fixed_offset());
    }

    let mut parts = text.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    let naive = NaiveDateTime::parse_from_str(&format!("{date} {time}"), DATE_TIME_FORMAT).ok()?;

    let source = match parts.next() {
        Some(zone) => zone.parse::<Tz>().unwrap_or_else(|_| {
            tracing::debug!(zone, "unknown broker time zone, using reporting zone");
            reporting
        }),
        None => reporting,
    };

    localize(naive, source, reporting)
}

fn localize(naive: NaiveDateTime, source: Tz, reporting: Tz) -> Option<DateTime<FixedOffset>> {
    let local = source.from_local_datetime(&naive).earliest()?;
    Some(local.with_timezone(&reporting).fixed_offset())
}

/// Manual cancel time the broker expects on `cancel_order`.
#[must_use]
pub fn format_cancel_time(now: DateTime<FixedOffset>) -> String {
    now.format(CANCEL_TIME_FORMAT).to_string()
}

/// End time of a historical request.
#[must_use]
pub fn format_end_time(end: DateTime<FixedOffset>) -> String {
    end.format(DATE_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::{America::New_York, Asia::Shanghai};

    #[test]
    fn date_only_is_midnight_in_reporting_zone() {
        let dt = parse_broker_time("20240105", Shanghai).unwrap();

        assert_eq!(dt.to_rfc3339(), "2024-01-05T00:00:00+08:00");
    }

    #[test]
    fn zone_suffix_is_converted_to_reporting_zone() {
        let dt = parse_broker_time("20230629 10:30:00 US/Eastern", Shanghai).unwrap();

        assert_eq!(dt.to_rfc3339(), "2023-06-29T22:30:00+08:00");
    }

    #[test]
    fn legacy_zone_names_resolve() {
        let dt = parse_broker_time("20230406 09:39:00 Hongkong", New_York).unwrap();

        assert_eq!(dt.to_rfc3339(), "2023-04-05T21:39:00-04:00");
    }

    #[test]
    fn missing_zone_reads_reporting_zone() {
        let dt = parse_broker_time("20240105  14:30:00", New_York).unwrap();

        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn unknown_zone_falls_back() {
        let dt = parse_broker_time("20240105 14:30:00 Mars/Olympus", Shanghai).unwrap();

        assert_eq!(dt.to_rfc3339(), "2024-01-05T14:30:00+08:00");
    }

    #[test]
    fn epoch_seconds_are_accepted() {
        let dt = parse_broker_time("1704465000", Tz::UTC).unwrap();

        assert_eq!(dt.to_rfc3339(), "2024-01-05T14:30:00+00:00");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_broker_time("", Tz::UTC).is_none());
        assert!(parse_broker_time("2024-01-05", Tz::UTC).is_none());
        assert!(parse_broker_time("20240105 25:00:00", Tz::UTC).is_none());
    }

    #[test]
    fn request_formats() {
        let dt = parse_broker_time("20240105 14:30:09", Tz::UTC).unwrap();

        assert_eq!(format_cancel_time(dt), "20240105-14:30:09");
        assert_eq!(format_end_time(dt), "20240105 14:30:09");
    }
}
