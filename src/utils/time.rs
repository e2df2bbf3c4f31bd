use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::utils::error::ServiceError;

/// Every lesson runs for exactly one hour; materialization, reschedule and
/// the synthetic pending view all derive `end_time` from this constant.
pub const LESSON_DURATION_MINUTES: i64 = 60;

/// A wall-clock time normalized to whole-second `HH:MM:SS` precision.
///
/// Stored time values reach the presentation layer in several shapes
/// (`14:00`, `14:00:00`, `14:00:00.123456`); this is the single parser used
/// everywhere, so sub-second noise is stripped exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WallClockTime(NaiveTime);

impl WallClockTime {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let raw = raw.trim();
        // Fractional seconds are legal input but never survive normalization.
        let whole = raw.split('.').next().unwrap_or(raw);
        let parsed = NaiveTime::parse_from_str(whole, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(whole, "%H:%M"))
            .map_err(|_| ServiceError::Format(format!("Malformed time value: '{raw}'")))?;
        Ok(Self(parsed))
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        Self(time.with_nanosecond(0).unwrap_or(time))
    }

    pub fn as_naive(self) -> NaiveTime {
        self.0
    }

    /// Offset by whole minutes, wrapping at midnight like `TIME` arithmetic.
    pub fn add_minutes(self, minutes: i64) -> Self {
        Self(self.0 + Duration::minutes(minutes))
    }

    /// Signed distance in whole minutes from `self` to `end`.
    pub fn minutes_until(self, end: WallClockTime) -> i64 {
        end.0.signed_duration_since(self.0).num_minutes()
    }
}

impl fmt::Display for WallClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

/// A calendar date normalized to `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let raw = raw.trim();
        // Accept a full ISO instant and keep only the date part.
        let date_part = raw
            .split(|c| c == 'T' || c == ' ')
            .next()
            .unwrap_or(raw);
        let parsed = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .map_err(|_| ServiceError::Format(format!("Malformed date value: '{raw}'")))?;
        Ok(Self(parsed))
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn as_naive(self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// ISO-8601 instant built from a normalized date and start time.
pub fn scheduled_for(date: CalendarDate, time: WallClockTime) -> String {
    format!("{date}T{time}.000Z")
}

/// Decompose a request's scheduled instant into the lesson's date and start
/// time, exactly as materialization stores them.
pub fn split_instant(instant: NaiveDateTime) -> (CalendarDate, WallClockTime) {
    (
        CalendarDate::from_naive(instant.date()),
        WallClockTime::from_naive(instant.time()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_accepted_time_shapes() {
        for raw in ["14:00", "14:00:00", "14:00:00.123456", " 14:00:00 "] {
            let t = WallClockTime::parse(raw).unwrap();
            assert_eq!(t.to_string(), "14:00:00", "input {raw:?}");
        }
    }

    #[test]
    fn rejects_malformed_times() {
        for raw in ["", "25:00:00", "2pm", "14", "14:60"] {
            let err = WallClockTime::parse(raw).unwrap_err();
            assert_eq!(err.kind(), "format", "input {raw:?}");
        }
    }

    #[test]
    fn subseconds_do_not_affect_duration() {
        let start = WallClockTime::parse("14:00:00.123456").unwrap();
        let end = WallClockTime::parse("15:00:00").unwrap();
        assert_eq!(start.minutes_until(end), 60);
    }

    #[test]
    fn date_accepts_plain_and_instant_forms() {
        for raw in ["2024-03-15", "2024-03-15T14:00:00", "2024-03-15 14:00:00"] {
            let d = CalendarDate::parse(raw).unwrap();
            assert_eq!(d.to_string(), "2024-03-15", "input {raw:?}");
        }
    }

    #[test]
    fn rejects_malformed_dates() {
        for raw in ["", "15-03-2024", "2024-13-01", "yesterday"] {
            let err = CalendarDate::parse(raw).unwrap_err();
            assert_eq!(err.kind(), "format", "input {raw:?}");
        }
    }

    #[test]
    fn scheduled_for_is_iso_with_zero_millis() {
        let d = CalendarDate::parse("2024-03-15").unwrap();
        let t = WallClockTime::parse("14:00:00.123456").unwrap();
        assert_eq!(scheduled_for(d, t), "2024-03-15T14:00:00.000Z");
    }

    #[test]
    fn add_minutes_wraps_at_midnight() {
        let t = WallClockTime::parse("23:30:00").unwrap();
        assert_eq!(t.add_minutes(LESSON_DURATION_MINUTES).to_string(), "00:30:00");
    }

    #[test]
    fn split_instant_matches_materialization() {
        let instant = NaiveDateTime::parse_from_str("2024-03-15T14:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        let (date, start) = split_instant(instant);
        assert_eq!(date.to_string(), "2024-03-15");
        assert_eq!(start.to_string(), "14:00:00");
        assert_eq!(
            start.add_minutes(LESSON_DURATION_MINUTES).to_string(),
            "15:00:00"
        );
    }
}
