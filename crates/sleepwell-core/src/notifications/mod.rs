//! Sleep and wake boundary notifications.
//!
//! Each enabled window arms two one-shot tasks, one per boundary, keyed
//! `notification_worker_{DAY}_{sleep|wake}` by the window's start day so a
//! reschedule replaces the pending pair. A sleep boundary notifies and starts
//! the motion sampler; a wake boundary notifies and stops it. A fired
//! boundary re-arms itself one week later.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::sampler::{SamplerController, SamplerStatus};
use crate::schedule::{day_name, next_occurrence, Clock, ScheduleWindow, WEEK};
use crate::tasks::TaskScheduler;

pub const KEY_PREFIX: &str = "notification_worker_";

const ONE_WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Sleep,
    Wake,
}

impl BoundaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryKind::Sleep => "sleep",
            BoundaryKind::Wake => "wake",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            BoundaryKind::Sleep => "Time to Sleep",
            BoundaryKind::Wake => "Time to Wake Up",
        }
    }

    pub fn body(&self) -> &'static str {
        match self {
            BoundaryKind::Sleep => "It's time to go to bed!",
            BoundaryKind::Wake => "It's time to wake up!",
        }
    }
}

/// Task key for one boundary of the window starting on `day`.
pub fn boundary_key(day: Weekday, kind: BoundaryKind) -> String {
    format!("{KEY_PREFIX}{}_{}", day_name(day), kind.as_str())
}

/// Time from `now` until the next `(day, time)`, rolling forward a week if
/// it already passed. Zero when `now` is exactly on it.
pub fn delay_until_next(now: NaiveDateTime, day: Weekday, time: NaiveTime) -> Duration {
    let target = next_occurrence(now, day, time);
    let millis = (target - now).num_milliseconds().max(0);
    Duration::from_millis(u64::try_from(millis).unwrap_or(0))
}

/// Presents notifications to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Writes notifications to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(target: "sleepwell::notify", title, body, "notification");
    }
}

/// Keeps every notification in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((title.to_string(), body.to_string()));
    }
}

/// What an edit requires of the sampler right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerAction {
    Start,
    Stop,
    NoChange,
}

/// Decide whether an edit to a window must start or stop the sampler
/// immediately instead of waiting for the next boundary.
///
/// Starts when the updated window covers `now` and the sampler is idle.
/// Stops when the updated window no longer covers `now`, the previous
/// version did, and the sampler is running.
pub fn evaluate_edit(
    previous: Option<&ScheduleWindow>,
    updated: &ScheduleWindow,
    now: NaiveDateTime,
    status: SamplerStatus,
) -> SamplerAction {
    let covers_now = updated.covers(now);
    let covered_before = previous.is_some_and(|w| w.covers(now));
    match status {
        SamplerStatus::Idle if covers_now => SamplerAction::Start,
        SamplerStatus::Running if !covers_now && covered_before => SamplerAction::Stop,
        _ => SamplerAction::NoChange,
    }
}

#[derive(Clone)]
pub struct NotificationScheduler {
    tasks: TaskScheduler,
    notifier: Arc<dyn Notifier>,
    sampler: SamplerController,
    clock: Clock,
    alerts: bool,
}

impl NotificationScheduler {
    pub fn new(
        tasks: TaskScheduler,
        notifier: Arc<dyn Notifier>,
        sampler: SamplerController,
        clock: Clock,
    ) -> Self {
        Self {
            tasks,
            notifier,
            sampler,
            clock,
            alerts: true,
        }
    }

    /// Keep boundary handling but skip presenting notifications.
    pub fn with_alerts(mut self, alerts: bool) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn sampler(&self) -> &SamplerController {
        &self.sampler
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// Arm both boundaries of every enabled window; cancel the rest,
    /// including days that have no window at all.
    pub fn reschedule_all(&self, windows: &[ScheduleWindow], now: NaiveDateTime) {
        for day in WEEK {
            match windows.iter().find(|w| w.start_day == day) {
                Some(window) => self.reschedule_window(window, now),
                None => self.cancel_day(day),
            }
        }
    }

    pub fn reschedule_window(&self, window: &ScheduleWindow, now: NaiveDateTime) {
        if !window.enabled {
            self.cancel_day(window.start_day);
            return;
        }
        let sleep_delay = delay_until_next(now, window.start_day, window.sleep_time);
        let wake_delay = delay_until_next(now, window.end_day, window.wake_time);
        self.arm(boundary_key(window.start_day, BoundaryKind::Sleep), sleep_delay, BoundaryKind::Sleep);
        self.arm(boundary_key(window.start_day, BoundaryKind::Wake), wake_delay, BoundaryKind::Wake);
        tracing::debug!(
            day = day_name(window.start_day),
            sleep_in_secs = sleep_delay.as_secs(),
            wake_in_secs = wake_delay.as_secs(),
            "armed boundaries"
        );
    }

    pub fn cancel_day(&self, day: Weekday) {
        self.tasks.cancel(&boundary_key(day, BoundaryKind::Sleep));
        self.tasks.cancel(&boundary_key(day, BoundaryKind::Wake));
    }

    pub fn cancel_all(&self) {
        self.tasks.cancel_prefix(KEY_PREFIX);
    }

    /// Pending boundary keys.
    pub fn pending(&self) -> Vec<String> {
        self.tasks
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(KEY_PREFIX))
            .collect()
    }

    fn arm(&self, key: String, delay: Duration, kind: BoundaryKind) {
        let this = self.clone();
        let task_key = key.clone();
        self.tasks.schedule_once(&key, delay, async move {
            this.fire(kind);
            this.arm(task_key, ONE_WEEK, kind);
        });
    }

    /// Handle a boundary: notify, then start or stop the sampler.
    pub fn fire(&self, kind: BoundaryKind) {
        tracing::info!(boundary = kind.as_str(), "boundary reached");
        if self.alerts {
            self.notifier.notify(kind.title(), kind.body());
        }
        match kind {
            BoundaryKind::Sleep => self.sampler.start(),
            BoundaryKind::Wake => self.sampler.stop(),
        };
    }

    /// Apply an [`evaluate_edit`] decision.
    pub fn apply(&self, action: SamplerAction) {
        match action {
            SamplerAction::Start => {
                self.sampler.start();
            }
            SamplerAction::Stop => {
                self.sampler.stop();
            }
            SamplerAction::NoChange => {}
        }
    }

    /// Bring the sampler in line with whichever window covers `now`.
    /// Used at startup, when no boundary has fired in this process yet.
    pub fn align_sampler(&self, windows: &[ScheduleWindow], now: NaiveDateTime) {
        let active = windows.iter().any(|w| w.covers(now));
        match (active, self.sampler.status()) {
            (true, SamplerStatus::Idle) => {
                self.sampler.start();
            }
            (false, SamplerStatus::Running) => {
                self.sampler.stop();
            }
            _ => {}
        }
    }
}
