//! Timestamp formatting utilities
//!
//! Produces the display string placed at the start of every log line. The
//! default matches the classic syslog-like layout (`8 Jan 10:30:45.123`) in
//! local time; ISO 8601, RFC 3339 and strftime formats are also available.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest timestamp the frontend renders on the stack.
pub const TIMESTAMP_BUF_LEN: usize = 64;

/// Timestamp format options
///
/// # Examples
///
/// ```
/// use rust_session_logger::TimestampFormat;
/// use chrono::{TimeZone, Utc};
///
/// let dt = Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
/// assert_eq!(TimestampFormat::Classic.format(&dt), "8 Jan 10:30:45.000");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// `<day> <Mon> HH:MM:SS.mmm`, e.g. `8 Jan 10:30:45.123`
    #[default]
    Classic,

    /// `HH:MM:SS <offset> <Wday> <Mon> DD YYYY`, e.g.
    /// `10:30:45 +00:00 Wed Jan 08 2025`. The zone is always the numeric
    /// UTC offset, never an abbreviation such as `CET`.
    Detailed,

    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123+00:00`
    Iso8601,

    /// RFC 3339 format: `2025-01-08T10:30:45+00:00`
    Rfc3339,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    fn pattern(&self) -> &str {
        match self {
            TimestampFormat::Classic => "%-d %b %H:%M:%S%.3f",
            TimestampFormat::Detailed => "%H:%M:%S %:z %a %b %d %Y",
            TimestampFormat::Iso8601 => "%Y-%m-%dT%H:%M:%S%.3f%:z",
            TimestampFormat::Rfc3339 => "%Y-%m-%dT%H:%M:%S%:z",
            TimestampFormat::Custom(format_str) => format_str,
        }
    }

    /// Render `datetime` into any `fmt::Write` sink without allocating
    pub fn write_to<Tz, W>(&self, out: &mut W, datetime: &DateTime<Tz>) -> fmt::Result
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
        W: fmt::Write,
    {
        write!(out, "{}", datetime.format(self.pattern()))
    }

    /// Format a `DateTime` according to this format
    #[must_use]
    pub fn format<Tz>(&self, datetime: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let mut out = String::with_capacity(32);
        // Writing into a String only fails on a bad custom pattern.
        if self.write_to(&mut out, datetime).is_err() {
            out.clear();
        }
        out
    }

    /// Format the current local time
    #[must_use]
    pub fn now(&self) -> String {
        self.format(&Local::now())
    }

    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            TimestampFormat::Classic => "Day, month and time with milliseconds (8 Jan 10:30:45.123)",
            TimestampFormat::Detailed => "Time, offset and full date (10:30:45 +00:00 Wed Jan 08 2025)",
            TimestampFormat::Iso8601 => "ISO 8601 with milliseconds (2025-01-08T10:30:45.123+00:00)",
            TimestampFormat::Rfc3339 => "RFC 3339 (2025-01-08T10:30:45+00:00)",
            TimestampFormat::Custom(_) => "Custom strftime format",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixed_datetime() -> DateTime<Utc> {
        // 2025-01-08 10:30:45.123456 UTC
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime")
            + chrono::Duration::microseconds(123456)
    }

    #[test]
    fn test_classic_format() {
        let result = TimestampFormat::Classic.format(&fixed_datetime());
        assert_eq!(result, "8 Jan 10:30:45.123");
    }

    #[test]
    fn test_detailed_format() {
        let result = TimestampFormat::Detailed.format(&fixed_datetime());
        assert_eq!(result, "10:30:45 +00:00 Wed Jan 08 2025");
    }

    #[test]
    fn test_iso8601_format() {
        let result = TimestampFormat::Iso8601.format(&fixed_datetime());
        assert_eq!(result, "2025-01-08T10:30:45.123+00:00");
    }

    #[test]
    fn test_rfc3339_format() {
        let result = TimestampFormat::Rfc3339.format(&fixed_datetime());
        assert_eq!(result, "2025-01-08T10:30:45+00:00");
    }

    #[test]
    fn test_custom_format() {
        let format = TimestampFormat::Custom("%Y/%m/%d".to_string());
        assert_eq!(format.format(&fixed_datetime()), "2025/01/08");
    }

    #[test]
    fn test_now_fits_stack_buffer() {
        for format in [
            TimestampFormat::Classic,
            TimestampFormat::Detailed,
            TimestampFormat::Iso8601,
            TimestampFormat::Rfc3339,
        ] {
            assert!(format.now().len() < TIMESTAMP_BUF_LEN, "{}", format.description());
        }
    }

    #[test]
    fn test_serde_roundtrip() {
        let format = TimestampFormat::Custom("%H:%M".to_string());
        let json = serde_json::to_string(&format).unwrap();
        let back: TimestampFormat = serde_json::from_str(&json).unwrap();
        assert_eq!(back, format);
    }
}
