//! Daily rollover of post buckets.
//!
//! A bucket is stale once the calendar day of its last post is before the
//! current calendar day. Both days are taken in the reference timezone of
//! `now`, so the comparison never depends on the elapsed time between the
//! two instants.

use super::clock::Timestamp;

pub fn needs_reset(last_post_time: Option<&Timestamp>, now: &Timestamp) -> bool {
    let Some(last_post_time) = last_post_time else {
        return true;
    };
    day_of(last_post_time, now) < now.date_naive()
}

/// Whether `at` falls on the same calendar day as `now`.
pub(crate) fn is_today(at: &Timestamp, now: &Timestamp) -> bool {
    day_of(at, now) == now.date_naive()
}

fn day_of(at: &Timestamp, now: &Timestamp) -> chrono::NaiveDate {
    at.with_timezone(&now.timezone()).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::clock::tests::{at, TZ};
    use chrono::prelude::*;

    #[test]
    fn absent_marker_resets() {
        assert!(needs_reset(None, &at(2024, 5, 1, 12, 0, 0)));
    }

    #[test]
    fn same_day_does_not_reset() {
        let last = at(2024, 5, 1, 0, 0, 0);
        assert!(!needs_reset(Some(&last), &at(2024, 5, 1, 23, 59, 59)));
    }

    #[test]
    fn midnight_crossing_resets_after_two_seconds() {
        let last = at(2024, 5, 1, 23, 59, 59);
        assert!(needs_reset(Some(&last), &at(2024, 5, 2, 0, 0, 1)));
    }

    #[test]
    fn long_gap_within_one_day_does_not_reset() {
        let last = at(2024, 5, 1, 0, 0, 1);
        assert!(!needs_reset(Some(&last), &at(2024, 5, 1, 23, 59, 59)));
    }

    #[test]
    fn day_is_taken_in_reference_zone_not_utc() {
        // 22:30 UTC on May 1st is 01:30 on May 2nd in Moscow
        let last = Utc
            .with_ymd_and_hms(2024, 5, 1, 22, 30, 0)
            .unwrap()
            .with_timezone(&TZ);

        assert!(!needs_reset(Some(&last), &at(2024, 5, 2, 9, 0, 0)));
        assert!(is_today(&last, &at(2024, 5, 2, 9, 0, 0)));
        assert!(!is_today(&last, &at(2024, 5, 1, 23, 0, 0)));
    }
}
