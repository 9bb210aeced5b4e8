//! Timestamps as persisted on records: RFC3339 strings in UTC.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::Mutex;

/// Source of the current time, injected so expiry can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|t| t.with_timezone(&Utc))
}

/// True when `value` lies strictly before `now`, at second resolution.
pub fn is_expired(value: &str, now: DateTime<Utc>) -> Result<bool, chrono::ParseError> {
    Ok(parse_timestamp(value)?.timestamp() < now.timestamp())
}

/// Cache-busting suffix: nanoseconds since the epoch.
pub fn unix_nanos(time: DateTime<Utc>) -> String {
    time.timestamp_nanos_opt()
        .unwrap_or_else(|| time.timestamp_micros().saturating_mul(1000))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_without_fractional_seconds() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(format_timestamp(t), "2024-05-01T12:30:00Z");
    }

    #[test]
    fn parses_offsets_into_utc() {
        let t = parse_timestamp("2024-05-01T14:30:00+02:00").unwrap();
        assert_eq!(format_timestamp(t), "2024-05-01T12:30:00Z");
    }

    #[test]
    fn expiry_is_strictly_before_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let past = format_timestamp(now - Duration::seconds(1));
        let future = format_timestamp(now + Duration::hours(1));

        assert!(is_expired(&past, now).unwrap());
        assert!(!is_expired(&format_timestamp(now), now).unwrap());
        assert!(!is_expired(&future, now).unwrap());
    }

    #[test]
    fn manual_clock_advances_on_request() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));
    }

    #[test]
    fn garbage_timestamps_are_errors() {
        assert!(is_expired("tomorrow", Utc::now()).is_err());
    }
}
