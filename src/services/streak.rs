//! Streak day-window policy
//!
//! A day window is one local calendar day under a fixed UTC offset,
//! `[local midnight, next local midnight)`, expressed in UTC. A streak
//! survives as long as the latest check-in falls in today's or
//! yesterday's window.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, Utc};

/// Half-open `[start, end)` interval covering one local day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Decides day boundaries and whether a streak should be reset.
#[derive(Debug, Clone, Copy)]
pub struct DayPolicy {
    offset: FixedOffset,
}

impl DayPolicy {
    /// Policy for a fixed offset in minutes east of UTC (negative = west).
    ///
    /// Offsets outside ±24h fall back to UTC.
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| {
            tracing::warn!(
                "UTC offset of {} minutes is out of range, using UTC",
                utc_offset_minutes
            );
            Utc.fix()
        });
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The local day containing `instant`
    pub fn window_containing(&self, instant: DateTime<Utc>) -> DayWindow {
        let local_midnight = instant
            .with_timezone(&self.offset)
            .date_naive()
            .and_time(NaiveTime::MIN);
        let utc_offset = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        let start = (local_midnight - utc_offset).and_utc();

        DayWindow {
            start,
            end: start + Duration::days(1),
        }
    }

    /// The local day before the one containing `now`
    pub fn yesterday(&self, now: DateTime<Utc>) -> DayWindow {
        let today = self.window_containing(now);
        DayWindow {
            start: today.start - Duration::days(1),
            end: today.start,
        }
    }

    /// Whether a habit whose latest check-in is `last_checkin` has broken
    /// its streak as of `now`.
    ///
    /// A check-in today or yesterday keeps the streak; anything older, or
    /// no check-in at all, resets it.
    pub fn should_reset(&self, last_checkin: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_checkin {
            Some(at) => at < self.yesterday(now).start,
            None => true,
        }
    }

    /// Time left until the current day window closes
    pub fn remaining_today(&self, now: DateTime<Utc>) -> Duration {
        self.window_containing(now).end - now
    }
}

/// Human-readable duration using its largest whole unit,
/// e.g. "3 hours", "1 minute" or "less than a second".
pub fn format_remaining(remaining: Duration) -> String {
    let plural = |n: i64, unit: &str| format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" });

    if remaining.num_hours() >= 1 {
        plural(remaining.num_hours(), "hour")
    } else if remaining.num_minutes() >= 1 {
        plural(remaining.num_minutes(), "minute")
    } else if remaining.num_seconds() >= 1 {
        plural(remaining.num_seconds(), "second")
    } else {
        "less than a second".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    // UTC-07:00; local midnight is 07:00Z
    fn policy() -> DayPolicy {
        DayPolicy::new(-420)
    }

    #[test]
    fn test_window_containing() {
        let window = policy().window_containing(at("2024-03-10T15:00:00Z"));
        assert_eq!(window.start, at("2024-03-10T07:00:00Z"));
        assert_eq!(window.end, at("2024-03-11T07:00:00Z"));

        // 03:00Z is still the previous local day
        let window = policy().window_containing(at("2024-03-10T03:00:00Z"));
        assert_eq!(window.start, at("2024-03-09T07:00:00Z"));
    }

    #[test]
    fn test_window_at_exact_midnight_belongs_to_new_day() {
        let midnight = at("2024-03-10T07:00:00Z");
        let window = policy().window_containing(midnight);
        assert_eq!(window.start, midnight);
        assert!(window.contains(midnight));
        assert!(!policy().yesterday(midnight).contains(midnight));
    }

    #[test]
    fn test_checked_in_today_is_kept() {
        let now = at("2024-03-10T15:00:00Z");
        assert!(!policy().should_reset(Some(at("2024-03-10T08:00:00Z")), now));
    }

    #[test]
    fn test_checked_in_yesterday_is_kept() {
        let now = at("2024-03-10T15:00:00Z");
        assert!(!policy().should_reset(Some(at("2024-03-09T10:00:00Z")), now));
        // First second of yesterday
        assert!(!policy().should_reset(Some(at("2024-03-09T07:00:00Z")), now));
    }

    #[test]
    fn test_missed_day_is_reset() {
        let now = at("2024-03-10T15:00:00Z");
        // 23:00 local on Mar 8, before yesterday started
        assert!(policy().should_reset(Some(at("2024-03-09T06:00:00Z")), now));
        assert!(policy().should_reset(Some(at("2024-03-01T12:00:00Z")), now));
    }

    #[test]
    fn test_never_checked_in_is_reset() {
        assert!(policy().should_reset(None, at("2024-03-10T15:00:00Z")));
    }

    #[test]
    fn test_utc_policy() {
        let utc = DayPolicy::new(0);
        let now = at("2024-03-10T00:30:00Z");
        assert!(!utc.should_reset(Some(at("2024-03-09T00:00:00Z")), now));
        assert!(utc.should_reset(Some(at("2024-03-08T23:59:59Z")), now));
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        assert_eq!(DayPolicy::new(100_000).offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_remaining_today() {
        let remaining = policy().remaining_today(at("2024-03-10T15:00:00Z"));
        assert_eq!(remaining, Duration::hours(16));
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::hours(3) + Duration::minutes(59)), "3 hours");
        assert_eq!(format_remaining(Duration::hours(1)), "1 hour");
        assert_eq!(format_remaining(Duration::minutes(1)), "1 minute");
        assert_eq!(format_remaining(Duration::seconds(45)), "45 seconds");
        assert_eq!(format_remaining(Duration::seconds(1)), "1 second");
        assert_eq!(format_remaining(Duration::milliseconds(999)), "less than a second");
        assert_eq!(format_remaining(Duration::zero()), "less than a second");
    }

    proptest! {
        #[test]
        fn prop_window_is_one_day_and_contains_instant(
            secs in 0i64..4_000_000_000,
            offset_minutes in -720i32..=840,
        ) {
            let policy = DayPolicy::new(offset_minutes);
            let instant = DateTime::from_timestamp(secs, 0).unwrap();
            let window = policy.window_containing(instant);

            prop_assert!(window.contains(instant));
            prop_assert_eq!(window.end - window.start, Duration::days(1));
            prop_assert!(!policy.should_reset(Some(instant), instant));
        }

        #[test]
        fn prop_two_days_ago_always_resets(
            secs in 200_000i64..4_000_000_000,
            offset_minutes in -720i32..=840,
        ) {
            let policy = DayPolicy::new(offset_minutes);
            let now = DateTime::from_timestamp(secs, 0).unwrap();
            prop_assert!(policy.should_reset(Some(now - Duration::hours(48)), now));
        }
    }
}
