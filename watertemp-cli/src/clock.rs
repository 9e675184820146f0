use chrono::{DateTime, Duration, TimeZone};

/// Time left until the next local midnight of `now`'s time zone.
pub fn until_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let next_midnight = now.date_naive().succ_opt().and_then(|day| day.and_hms_opt(0, 0, 0));
    let Some(naive) = next_midnight else {
        return Duration::zero();
    };

    match now.timezone().from_local_datetime(&naive).earliest() {
        Some(midnight) => midnight.signed_duration_since(now),
        // Midnight does not exist in this zone today (DST gap); count wall-clock time.
        None => naive - now.naive_local(),
    }
}

pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);

    format!("{hours} hours, {minutes} minutes and {seconds} seconds")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn counts_down_to_next_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 22, 30, 15).unwrap();

        assert_eq!(until_midnight(&now), Duration::seconds(5385));
    }

    #[test]
    fn at_midnight_a_full_day_remains() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();

        assert_eq!(until_midnight(&now), Duration::hours(24));
    }

    #[test]
    fn uses_the_local_offset() {
        let cet = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = cet.with_ymd_and_hms(2024, 6, 1, 23, 0, 0).unwrap();

        assert_eq!(until_midnight(&now), Duration::hours(1));
    }

    #[test]
    fn formats_hours_minutes_and_seconds() {
        assert_eq!(
            format_remaining(Duration::seconds(5385)),
            "1 hours, 29 minutes and 45 seconds"
        );
        assert_eq!(format_remaining(Duration::seconds(-3)), "0 hours, 0 minutes and 0 seconds");
    }
}
