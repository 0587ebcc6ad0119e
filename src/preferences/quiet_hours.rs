//! Quiet-hours window evaluation.

use chrono::{DateTime, Datelike, NaiveTime, Utc};

use super::QuietHours;

/// Whether `instant` falls inside the configured quiet window.
///
/// The instant is converted to the window's timezone; `days_of_week` is
/// matched against that local day. `start == end` covers the whole day and
/// `start > end` wraps past midnight. The `enabled` flag is the caller's
/// concern.
pub fn is_quiet(config: &QuietHours, instant: DateTime<Utc>) -> bool {
    let local = instant.with_timezone(&config.timezone);

    if !config.days_of_week.is_empty() {
        let today = local.weekday().num_days_from_sunday() as u8;
        if !config.days_of_week.contains(&today) {
            return false;
        }
    }

    in_window(config.start, config.end, local.time())
}

fn in_window(start: NaiveTime, end: NaiveTime, now: NaiveTime) -> bool {
    if start == end {
        true
    } else if start < end {
        start <= now && now < end
    } else {
        now >= start || now < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Tz;
    use std::collections::BTreeSet;

    fn t(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn window(start: NaiveTime, end: NaiveTime) -> QuietHours {
        QuietHours {
            enabled: true,
            start,
            end,
            timezone: Tz::UTC,
            allow_critical: true,
            days_of_week: BTreeSet::new(),
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        // 2024-01-07 is a Sunday
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_overnight_window_every_day() {
        let config = window(t(22, 0), t(6, 0));
        for day in 7..14 {
            assert!(is_quiet(&config, at(day, 23, 30)));
            assert!(is_quiet(&config, at(day, 2, 0)));
            assert!(!is_quiet(&config, at(day, 12, 0)));
        }
    }

    #[test]
    fn test_window_boundaries() {
        let config = window(t(22, 0), t(6, 0));
        assert!(is_quiet(&config, at(8, 22, 0)));
        assert!(!is_quiet(&config, at(8, 6, 0)));
        assert!(is_quiet(&config, at(8, 5, 59)));

        let daytime = window(t(9, 0), t(17, 0));
        assert!(is_quiet(&daytime, at(8, 9, 0)));
        assert!(!is_quiet(&daytime, at(8, 17, 0)));
        assert!(!is_quiet(&daytime, at(8, 8, 59)));
    }

    #[test]
    fn test_equal_start_and_end_is_whole_day() {
        let config = window(t(9, 0), t(9, 0));
        for hour in 0..24 {
            assert!(is_quiet(&config, at(9, hour, 17)));
        }
    }

    #[test]
    fn test_days_of_week_filter() {
        let mut config = window(t(9, 0), t(17, 0));
        // Saturday and Sunday only
        config.days_of_week = BTreeSet::from([0, 6]);

        assert!(is_quiet(&config, at(7, 12, 0))); // Sunday
        assert!(!is_quiet(&config, at(8, 12, 0))); // Monday
        assert!(is_quiet(&config, at(13, 12, 0))); // Saturday
    }

    #[test]
    fn test_timezone_conversion() {
        let mut config = window(t(22, 0), t(6, 0));
        config.timezone = Tz::America__New_York;

        // 03:00 UTC on a January Monday is 22:00 the previous evening in New York
        assert!(is_quiet(&config, at(8, 3, 0)));
        // 17:00 UTC is noon in New York
        assert!(!is_quiet(&config, at(8, 17, 0)));
    }

    #[test]
    fn test_local_day_decides_membership() {
        let mut config = window(t(22, 0), t(6, 0));
        config.timezone = Tz::Asia__Tokyo;
        // Monday only
        config.days_of_week = BTreeSet::from([1]);

        // Sunday 16:00 UTC is Monday 01:00 in Tokyo
        assert!(is_quiet(&config, at(7, 16, 0)));
        // Monday 16:00 UTC is Tuesday 01:00 in Tokyo
        assert!(!is_quiet(&config, at(8, 16, 0)));
    }
}
