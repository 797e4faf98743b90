//! Timestamps and intervals on a 64-bit microsecond timeline.
//!
//! All temporal arithmetic in the engine runs on raw microsecond counts;
//! `chrono` is only consulted at the text boundary (parsing and formatting).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// A point on the timeline, stored as microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_micros(micros: i64) -> Self {
        Timestamp(micros)
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    /// Midnight UTC of the given calendar date.
    ///
    /// # Panics
    ///
    /// Panics on an invalid date; intended for literals in tests and examples.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Self {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap_or_else(|| panic!("invalid date {year}-{month}-{day}"));
        let dt = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        Timestamp(Utc.from_utc_datetime(&dt).timestamp_micros())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Timestamp(dt.timestamp_micros())
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.0).expect("timestamp out of chrono range")
    }
}

impl Sub for Timestamp {
    type Output = Interval;

    fn sub(self, rhs: Timestamp) -> Interval {
        Interval::from_micros(self.0 - rhs.0)
    }
}

impl Add<Interval> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Interval) -> Timestamp {
        Timestamp(self.0 + rhs.micros())
    }
}

impl Sub<Interval> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Interval) -> Timestamp {
        Timestamp(self.0 - rhs.micros())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dt = self.to_datetime();
        if self.0 % 1_000_000 == 0 {
            write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S+00"))
        } else {
            write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.6f+00"))
        }
    }
}

impl FromStr for Timestamp {
    type Err = String;

    /// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.ffffff]`, with an optional
    /// trailing UTC offset written as `+HH` or `+HH:MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty timestamp".to_string());
        }

        // Split a trailing offset off the date-time part. The sign search must
        // skip the date's own dashes, so only look past the first 10 chars.
        let (body, offset_micros) = match s[10.min(s.len())..].find(['+', '-']) {
            Some(rel) => {
                let at = rel + 10.min(s.len());
                let (body, off) = s.split_at(at);
                (body.trim_end(), parse_offset(off)?)
            }
            None => (s, 0i64),
        };

        let naive = parse_naive(body)?;
        let micros = Utc.from_utc_datetime(&naive).timestamp_micros() - offset_micros;
        Ok(Timestamp(micros))
    }
}

fn parse_naive(body: &str) -> Result<NaiveDateTime, String> {
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(body, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(body, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).expect("midnight is always valid"));
    }
    Err(format!("invalid timestamp {body:?}"))
}

fn parse_offset(off: &str) -> Result<i64, String> {
    let sign = match off.as_bytes().first() {
        Some(b'+') => 1i64,
        Some(b'-') => -1i64,
        _ => return Err(format!("invalid offset {off:?}")),
    };
    let digits = &off[1..];
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None => (digits, "0"),
    };
    let h: i64 = hours.parse().map_err(|_| format!("invalid offset {off:?}"))?;
    let m: i64 = minutes.parse().map_err(|_| format!("invalid offset {off:?}"))?;
    if h > 15 || m > 59 {
        return Err(format!("offset out of range {off:?}"));
    }
    Ok(sign * (h * 3600 + m * 60) * 1_000_000)
}

/// A signed length of time in microseconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Interval(i64);

impl Interval {
    pub const ZERO: Interval = Interval(0);

    pub const fn from_micros(micros: i64) -> Self {
        Interval(micros)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Interval(secs * 1_000_000)
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e6
    }
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Interval) -> Interval {
        Interval(self.0 + rhs.0)
    }
}

impl Sub for Interval {
    type Output = Interval;

    fn sub(self, rhs: Interval) -> Interval {
        Interval(self.0 - rhs.0)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", TimeDelta::microseconds(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip_micros() {
        let t = Timestamp::from_micros(1234567);
        assert_eq!(t.micros(), 1234567);
    }

    #[test]
    fn test_timestamp_parse_date_only() {
        let t: Timestamp = "2000-01-01".parse().unwrap();
        assert_eq!(t, Timestamp::from_ymd(2000, 1, 1));
    }

    #[test]
    fn test_timestamp_parse_with_time_and_offset() {
        let t: Timestamp = "2000-01-01 02:00:00+02".parse().unwrap();
        assert_eq!(t, Timestamp::from_ymd(2000, 1, 1));

        let t: Timestamp = "2000-01-01 00:00:00+00".parse().unwrap();
        assert_eq!(t, Timestamp::from_ymd(2000, 1, 1));
    }

    #[test]
    fn test_timestamp_parse_negative_offset() {
        let t: Timestamp = "1999-12-31 19:00:00-05".parse().unwrap();
        assert_eq!(t, Timestamp::from_ymd(2000, 1, 1));
    }

    #[test]
    fn test_timestamp_display_is_parseable() {
        let t = Timestamp::from_ymd(2000, 1, 1);
        let s = t.to_string();
        assert_eq!(s, "2000-01-01 00:00:00+00");
        assert_eq!(s.parse::<Timestamp>().unwrap(), t);
    }

    #[test]
    fn test_timestamp_display_keeps_fraction() {
        let t = Timestamp::from_micros(Timestamp::from_ymd(2000, 1, 1).micros() + 500_000);
        let s = t.to_string();
        assert_eq!(s, "2000-01-01 00:00:00.500000+00");
        assert_eq!(s.parse::<Timestamp>().unwrap(), t);
    }

    #[test]
    fn test_timestamp_parse_rejects_garbage() {
        assert!("not a date".parse::<Timestamp>().is_err());
        assert!("".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_interval_arithmetic() {
        let a = Timestamp::from_micros(10);
        let b = Timestamp::from_micros(4);
        let d = a - b;
        assert_eq!(d, Interval::from_micros(6));
        assert_eq!(b + d, a);
        assert_eq!(d + Interval::from_micros(4), Interval::from_micros(10));
        assert!(Interval::ZERO < d);
    }
}
