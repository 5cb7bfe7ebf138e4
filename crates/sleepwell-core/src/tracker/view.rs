//! Observable snapshots for a display layer.

use tokio::sync::watch;

use crate::schedule::ScheduleWindow;
use crate::storage::MotionSample;

/// How many of the newest motion samples the view carries.
pub const RECENT_SAMPLES: usize = 50;

/// Latest values re-read from the store after each mutation. Receivers are
/// only woken when a value actually changes.
pub struct ViewState {
    windows: watch::Sender<Vec<ScheduleWindow>>,
    logged_in: watch::Sender<bool>,
    dark_mode: watch::Sender<bool>,
    motion: watch::Sender<Vec<MotionSample>>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

fn publish<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            windows: watch::channel(Vec::new()).0,
            logged_in: watch::channel(false).0,
            dark_mode: watch::channel(false).0,
            motion: watch::channel(Vec::new()).0,
        }
    }

    pub fn subscribe_windows(&self) -> watch::Receiver<Vec<ScheduleWindow>> {
        self.windows.subscribe()
    }

    pub fn subscribe_logged_in(&self) -> watch::Receiver<bool> {
        self.logged_in.subscribe()
    }

    pub fn subscribe_dark_mode(&self) -> watch::Receiver<bool> {
        self.dark_mode.subscribe()
    }

    pub fn subscribe_motion(&self) -> watch::Receiver<Vec<MotionSample>> {
        self.motion.subscribe()
    }

    pub fn windows(&self) -> Vec<ScheduleWindow> {
        self.windows.borrow().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        *self.logged_in.borrow()
    }

    pub fn dark_mode(&self) -> bool {
        *self.dark_mode.borrow()
    }

    pub fn motion(&self) -> Vec<MotionSample> {
        self.motion.borrow().clone()
    }

    pub(crate) fn set_windows(&self, windows: Vec<ScheduleWindow>) {
        publish(&self.windows, windows);
    }

    pub(crate) fn set_logged_in(&self, logged_in: bool) {
        publish(&self.logged_in, logged_in);
    }

    pub(crate) fn set_dark_mode(&self, dark_mode: bool) {
        publish(&self.dark_mode, dark_mode);
    }

    /// `samples` newest first; only the first [`RECENT_SAMPLES`] are kept.
    pub(crate) fn set_motion(&self, mut samples: Vec<MotionSample>) {
        samples.truncate(RECENT_SAMPLES);
        publish(&self.motion, samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_values_do_not_wake_receivers() {
        let view = ViewState::new();
        let mut rx = view.subscribe_dark_mode();
        view.set_dark_mode(false);
        assert!(!rx.has_changed().unwrap());

        view.set_dark_mode(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        assert!(view.dark_mode());
    }

    #[test]
    fn motion_is_capped() {
        let view = ViewState::new();
        let now = chrono::Utc::now();
        let samples = (0..(RECENT_SAMPLES as i64 + 5))
            .map(|id| MotionSample {
                id,
                day: "Monday".into(),
                count: 1,
                captured_at: now,
            })
            .collect();
        view.set_motion(samples);
        assert_eq!(view.motion().len(), RECENT_SAMPLES);
        assert_eq!(view.motion()[0].id, 0);
    }
}
