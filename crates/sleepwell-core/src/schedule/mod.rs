//! Weekly sleep windows.
//!
//! A [`ScheduleWindow`] is one recurring night: it starts on `start_day` at
//! `sleep_time` and ends on `end_day` at `wake_time`. Exactly one window
//! exists per start day.
//!
//! All instants here are naive local date-times. Callers pass
//! `chrono::Local::now().naive_local()` in production and fixed instants in
//! tests.

mod occurrence;

pub use occurrence::{last_occurrence_at_or_before, next_occurrence, next_occurrence_after};

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Days in week order, Monday first.
pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub const DEFAULT_SLEEP_TIME: &str = "22:00";
pub const DEFAULT_WAKE_TIME: &str = "07:00";

/// Source of the current local wall-clock time.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn local_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

/// A clock frozen at `at`, for tests and replays.
pub fn fixed_clock(at: NaiveDateTime) -> Clock {
    Arc::new(move || at)
}

/// Interpret a local wall-clock instant as UTC. Ambiguous or skipped local
/// times (DST changes) take the earliest mapping, or the naive value as UTC.
pub fn local_to_utc(now: NaiveDateTime) -> DateTime<Utc> {
    Local
        .from_local_datetime(&now)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&now))
}

/// One recurring night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    /// Local identifier, assigned by the store. Zero until inserted.
    pub id: i64,
    #[serde(with = "day_serde")]
    pub start_day: Weekday,
    #[serde(with = "day_serde")]
    pub end_day: Weekday,
    #[serde(with = "time_serde")]
    pub sleep_time: NaiveTime,
    #[serde(with = "time_serde")]
    pub wake_time: NaiveTime,
    pub enabled: bool,
}

impl ScheduleWindow {
    /// A not-yet-stored window.
    pub fn new(
        start_day: Weekday,
        end_day: Weekday,
        sleep_time: NaiveTime,
        wake_time: NaiveTime,
        enabled: bool,
    ) -> Self {
        Self {
            id: 0,
            start_day,
            end_day,
            sleep_time,
            wake_time,
            enabled,
        }
    }

    /// Whether this window is active at `now`.
    ///
    /// The active interval is `[sleep, wake)`, where `sleep` is the latest
    /// `(start_day, sleep_time)` at or before `now` and `wake` is the first
    /// `(end_day, wake_time)` after `sleep`. Disabled windows never cover.
    pub fn covers(&self, now: NaiveDateTime) -> bool {
        if !self.enabled {
            return false;
        }
        let sleep = last_occurrence_at_or_before(now, self.start_day, self.sleep_time);
        let wake = next_occurrence_after(sleep, self.end_day, self.wake_time);
        now >= sleep && now < wake
    }

    /// The day after `start_day`'s night ends on, used for new windows.
    pub fn default_end_day(start_day: Weekday) -> Weekday {
        start_day.succ()
    }

    /// Time from the sleep boundary to the following wake boundary.
    pub fn night_length(&self) -> chrono::Duration {
        // any fixed date works; only the weekly offsets matter
        let anchor = chrono::NaiveDate::from_isoywd_opt(2024, 1, self.start_day)
            .map(|d| d.and_time(self.sleep_time))
            .unwrap_or_default();
        next_occurrence_after(anchor, self.end_day, self.wake_time) - anchor
    }
}

/// The seven default windows: every night 22:00 to 07:00 the next day.
pub fn default_week(sleep_time: NaiveTime, wake_time: NaiveTime) -> Vec<ScheduleWindow> {
    WEEK.iter()
        .map(|&day| {
            ScheduleWindow::new(
                day,
                ScheduleWindow::default_end_day(day),
                sleep_time,
                wake_time,
                true,
            )
        })
        .collect()
}

/// Upper-case English day name, the stored and mirrored form.
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

/// Day label used for motion samples, e.g. "Monday".
pub fn day_label(now: NaiveDateTime) -> String {
    now.format("%A").to_string()
}

/// Parse "MONDAY", "monday", "Mon" or "mon".
pub fn parse_weekday(value: &str) -> Result<Weekday, ValidationError> {
    let trimmed = value.trim();
    WEEK.iter()
        .copied()
        .find(|day| day_name(*day).eq_ignore_ascii_case(trimmed))
        .or_else(|| trimmed.parse::<Weekday>().ok())
        .ok_or_else(|| ValidationError::InvalidValue {
            field: "day".into(),
            message: format!("'{value}' is not a day of the week"),
        })
}

/// Parse "HH:MM" (seconds are accepted and ignored).
pub fn parse_time(value: &str) -> Result<NaiveTime, ValidationError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map(|t| t.with_second(0).unwrap_or(t))
        .map_err(|_| ValidationError::InvalidValue {
            field: "time".into(),
            message: format!("'{value}' is not a HH:MM time"),
        })
}

/// Format as "HH:MM".
pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Index of a day within [`WEEK`], used for stable ordering.
pub fn week_index(day: Weekday) -> u32 {
    day.num_days_from_monday()
}

pub(crate) mod day_serde {
    use chrono::Weekday;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(day: &Weekday, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(super::day_name(*day))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Weekday, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_weekday(&raw).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod time_serde {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}
