//! Absolute instants for telemetry rows.
//!
//! Every timestamp that enters the system (CSV cells, `--start-time`,
//! `--end-time`) is normalized here to UTC microseconds since the Unix epoch.
//! Naive strings are read as UTC; strings with an offset are converted. After
//! ingestion nothing downstream has to care about time zones.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Microseconds per second.
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Microseconds per millisecond.
pub const MICROS_PER_MILLI: i64 = 1_000;

/// Space-separated layouts written by the upstream log decoder.
const NATIVE_NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y/%m/%d %H:%M:%S%.f"];
const NATIVE_AWARE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// `T`-separated ISO-8601 layouts without an offset.
const ISO_NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// An absolute instant, UTC microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp from epoch microseconds.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Creates a timestamp from epoch seconds (fractional allowed).
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * MICROS_PER_SEC as f64).round() as i64)
    }

    /// Creates a timestamp from a UTC datetime.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_micros())
    }

    /// Returns epoch microseconds.
    pub fn micros(self) -> i64 {
        self.0
    }

    /// Returns the instant as a UTC datetime, if it is representable.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_micros(self.0)
    }

    /// Seconds elapsed from `earlier` to `self` (negative if `self` is earlier).
    pub fn seconds_since(self, earlier: Timestamp) -> f64 {
        self.0.saturating_sub(earlier.0) as f64 / MICROS_PER_SEC as f64
    }

    /// Shifts the instant by a (possibly negative) number of seconds,
    /// saturating at the ends of the representable range.
    pub fn offset_secs(self, secs: f64) -> Timestamp {
        // Float-to-int `as` saturates; NaN becomes 0.
        Timestamp(self.0.saturating_add((secs * MICROS_PER_SEC as f64).round() as i64))
    }

    /// Absolute distance to another instant in microseconds.
    pub fn abs_diff_micros(self, other: Timestamp) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Wall-clock rendering `HH:MM:SS.mmm` used in frame titles.
    pub fn clock_label(self) -> String {
        match self.to_datetime() {
            Some(dt) => dt.format("%H:%M:%S%.3f").to_string(),
            None => format!("{:.3}s", self.0 as f64 / MICROS_PER_SEC as f64),
        }
    }

    /// Parses a raw timestamp cell or CLI argument.
    ///
    /// Tried in order: native datetime (`YYYY-MM-DD HH:MM:SS[.fff][offset]`),
    /// strict ISO-8601 / RFC 3339, then integer (or float) microseconds since
    /// the epoch. Returns `None` when nothing matches.
    pub fn parse(raw: &str) -> Option<Timestamp> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        parse_native(s)
            .or_else(|| parse_iso8601(s))
            .or_else(|| parse_epoch_micros(s))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.6f")),
            None => write!(f, "{}us", self.0),
        }
    }
}

fn parse_native(s: &str) -> Option<Timestamp> {
    for fmt in NATIVE_AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(Timestamp::from_datetime(dt.with_timezone(&Utc)));
        }
    }
    // A trailing `Z` on the native layout means UTC.
    let body = s.strip_suffix('Z').unwrap_or(s);
    for fmt in NATIVE_NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(body, fmt) {
            return Some(Timestamp::from_datetime(naive.and_utc()));
        }
    }
    None
}

fn parse_iso8601(s: &str) -> Option<Timestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Timestamp::from_datetime(dt.with_timezone(&Utc)));
    }
    let body = s.strip_suffix('Z').unwrap_or(s);
    for fmt in ISO_NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(body, fmt) {
            return Some(Timestamp::from_datetime(naive.and_utc()));
        }
    }
    NaiveDate::parse_from_str(body, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Timestamp::from_datetime(naive.and_utc()))
}

fn parse_epoch_micros(s: &str) -> Option<Timestamp> {
    if let Ok(us) = s.parse::<i64>() {
        return Some(Timestamp(us));
    }
    match s.parse::<f64>() {
        Ok(us) if us.is_finite() && us.abs() < i64::MAX as f64 => Some(Timestamp(us.round() as i64)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap())
    }

    #[test]
    fn test_native_datetime() {
        let ts = Timestamp::parse("2024-05-01 12:30:15.250").unwrap();
        assert_eq!(ts, Timestamp(utc(2024, 5, 1, 12, 30, 15).0 + 250_000));

        let whole = Timestamp::parse("2024-05-01 12:30:15").unwrap();
        assert_eq!(whole, utc(2024, 5, 1, 12, 30, 15));
    }

    #[test]
    fn test_native_with_offset_is_converted() {
        let ts = Timestamp::parse("2024-05-01 14:30:15+02:00").unwrap();
        assert_eq!(ts, utc(2024, 5, 1, 12, 30, 15));
    }

    #[test]
    fn test_iso8601_variants() {
        assert_eq!(
            Timestamp::parse("2024-05-01T12:30:15Z").unwrap(),
            utc(2024, 5, 1, 12, 30, 15)
        );
        assert_eq!(
            Timestamp::parse("2024-05-01T07:30:15-05:00").unwrap(),
            utc(2024, 5, 1, 12, 30, 15)
        );
        assert_eq!(
            Timestamp::parse("2024-05-01T12:30:15.5").unwrap(),
            Timestamp(utc(2024, 5, 1, 12, 30, 15).0 + 500_000)
        );
        assert_eq!(Timestamp::parse("2024-05-01").unwrap(), utc(2024, 5, 1, 0, 0, 0));
    }

    #[test]
    fn test_epoch_micros() {
        assert_eq!(Timestamp::parse("1714566615000000").unwrap(), utc(2024, 5, 1, 12, 30, 15));
        assert_eq!(Timestamp::parse(" 42 ").unwrap(), Timestamp(42));
        assert_eq!(Timestamp::parse("1.5e6").unwrap(), Timestamp(1_500_000));
    }

    #[test]
    fn test_unparsable() {
        assert!(Timestamp::parse("").is_none());
        assert!(Timestamp::parse("yesterday").is_none());
        assert!(Timestamp::parse("NaN").is_none());
    }

    #[test]
    fn test_arithmetic_and_labels() {
        let a = utc(2024, 5, 1, 12, 0, 0);
        let b = a.offset_secs(1.25);
        assert_relative_eq!(b.seconds_since(a), 1.25, epsilon = 1e-9);
        assert_eq!(b.abs_diff_micros(a), 1_250_000);
        assert_eq!(b.clock_label(), "12:00:01.250");
    }

    #[test]
    fn test_offset_saturates() {
        assert_eq!(Timestamp(i64::MAX - 5).offset_secs(10.0), Timestamp(i64::MAX));
        assert_eq!(Timestamp(i64::MIN + 5).offset_secs(-1e300), Timestamp(i64::MIN));
        assert_eq!(Timestamp(7).offset_secs(f64::NAN), Timestamp(7));
    }
}
