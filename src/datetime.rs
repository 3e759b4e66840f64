//! Date/time utilities for Parlor.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;

/// Format a UTC instant in the given timezone.
///
/// Falls back to UTC when the timezone name is unknown.
pub fn format_in_zone(dt: &DateTime<Utc>, timezone: &str, format: &str) -> String {
    match timezone.parse::<Tz>() {
        Ok(tz) => dt.with_timezone(&tz).format(format).to_string(),
        Err(_) => dt.format(format).to_string(),
    }
}

/// Wall-clock time (`HH:MM:SS`) used to stamp outbound chat events.
pub fn format_clock(dt: &DateTime<Utc>, timezone: &str) -> String {
    format_in_zone(dt, timezone, "%H:%M:%S")
}

/// Full local date and time, as shown by `/time`.
pub fn format_full(dt: &DateTime<Utc>, timezone: &str) -> String {
    format_in_zone(dt, timezone, "%d/%m/%Y %H:%M:%S")
}

/// ISO-8601 UTC timestamp with milliseconds, used in recordings.
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
