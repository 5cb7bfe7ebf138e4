//! Weekly occurrence arithmetic for (day, time-of-day) pairs.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};

fn days_forward(from: Weekday, to: Weekday) -> i64 {
    let diff = to.num_days_from_monday() as i64 - from.num_days_from_monday() as i64;
    diff.rem_euclid(7)
}

/// First `(day, time)` at or after `now`.
///
/// If that day/time has already passed this week, the result rolls forward
/// one week.
pub fn next_occurrence(now: NaiveDateTime, day: Weekday, time: NaiveTime) -> NaiveDateTime {
    let date = now.date() + Duration::days(days_forward(now.weekday(), day));
    let candidate = date.and_time(time);
    if candidate < now {
        candidate + Duration::weeks(1)
    } else {
        candidate
    }
}

/// First `(day, time)` strictly after `instant`.
pub fn next_occurrence_after(
    instant: NaiveDateTime,
    day: Weekday,
    time: NaiveTime,
) -> NaiveDateTime {
    let candidate = next_occurrence(instant, day, time);
    if candidate == instant {
        candidate + Duration::weeks(1)
    } else {
        candidate
    }
}

/// Latest `(day, time)` at or before `now`.
pub fn last_occurrence_at_or_before(
    now: NaiveDateTime,
    day: Weekday,
    time: NaiveTime,
) -> NaiveDateTime {
    let date = now.date() - Duration::days(days_forward(day, now.weekday()));
    let candidate = date.and_time(time);
    if candidate > now {
        candidate - Duration::weeks(1)
    } else {
        candidate
    }
}
