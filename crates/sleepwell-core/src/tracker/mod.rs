//! The coordinator behind every user-facing operation.
//!
//! A mutation writes the local store first, then adjusts the sampler and
//! the boundary tasks, then mirrors the change remotely, and finally
//! re-reads the store into [`ViewState`].
//!
//! The store mutex is never held across an `.await`.
//!
//! Several processes may open the same data directory. Only a tracker that
//! has armed its boundaries (a daemon) owns sampler and boundary tasks;
//! it follows window writes from the others through [`SleepTracker::watch_store`].

mod view;

pub use view::{ViewState, RECENT_SAMPLES};

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::cleanup;
use crate::error::{CoreError, ValidationError};
use crate::notifications::{evaluate_edit, LogNotifier, NotificationScheduler, Notifier, SamplerAction};
use crate::prefs::{CryptoManager, UserPreferences};
use crate::remote::{self, RemoteMirror};
use crate::sampler::{
    hub_from_config, MotionSampler, SamplerController, SamplerStatus, SensorHub, Thresholds,
};
use crate::schedule::{day_label, day_name, default_week, local_clock, local_to_utc, Clock, ScheduleWindow};
use crate::storage::{lock, shared, Config, MotionSample, MotionStats, SharedDb, SleepDb};
use crate::sync::{PushOutcome, SyncOutcome, SyncState, Synchronizer};
use crate::tasks::{TaskFuture, TaskScheduler};

const DB_FILE: &str = "sleepwell.db";

pub const STORE_WATCH_KEY: &str = "store_watch_worker";

/// Result of adding, editing or removing a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowChange {
    pub window: ScheduleWindow,
    /// What the edit requires of the sampler right now. Judged against the
    /// schedule when this process does not own the sampler.
    pub sampler: SamplerAction,
    /// Remote push result; `None` while logged out.
    pub remote: Option<PushOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepStats {
    pub windows: usize,
    pub enabled_windows: usize,
    /// Mean night length over enabled windows.
    pub average_sleep_minutes: Option<f64>,
    pub motion: MotionStats,
}

pub struct TrackerBuilder {
    db: SleepDb,
    crypto: CryptoManager,
    mirror: Arc<dyn RemoteMirror>,
    config: Config,
    sensors: Option<Arc<dyn SensorHub>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Clock>,
}

impl TrackerBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Defaults to the backend named in `sampler.sensor_backend`.
    pub fn sensors(mut self, sensors: Arc<dyn SensorHub>) -> Self {
        self.sensors = Some(sensors);
        self
    }

    /// Defaults to [`LogNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Defaults to the local wall clock.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> SleepTracker {
        let db = shared(self.db);
        let clock = self.clock.unwrap_or_else(local_clock);
        let hub = self
            .sensors
            .unwrap_or_else(|| hub_from_config(&self.config.sampler));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(LogNotifier) as Arc<dyn Notifier>);

        let tasks = TaskScheduler::new();
        let sampler = MotionSampler::from_config(db.clone(), hub.clone(), &self.config.sampler);
        let period = Duration::from_secs(self.config.sampler.period_minutes.max(1) * 60);
        let controller = SamplerController::new(sampler, tasks.clone(), period, clock.clone());
        let notifications = NotificationScheduler::new(tasks.clone(), notifier, controller, clock.clone())
            .with_alerts(self.config.notifications.enabled);

        SleepTracker {
            db,
            prefs: UserPreferences::new(self.crypto),
            sync: Synchronizer::new(self.mirror),
            notifications,
            tasks,
            hub,
            config: self.config,
            clock,
            view: Arc::new(ViewState::new()),
            armed: AtomicBool::new(false),
        }
    }
}

pub struct SleepTracker {
    db: SharedDb,
    prefs: UserPreferences,
    sync: Synchronizer,
    notifications: NotificationScheduler,
    tasks: TaskScheduler,
    hub: Arc<dyn SensorHub>,
    config: Config,
    clock: Clock,
    view: Arc<ViewState>,
    armed: AtomicBool,
}

impl SleepTracker {
    pub fn builder(db: SleepDb, crypto: CryptoManager, mirror: Arc<dyn RemoteMirror>) -> TrackerBuilder {
        TrackerBuilder {
            db,
            crypto,
            mirror,
            config: Config::default(),
            sensors: None,
            notifier: None,
            clock: None,
        }
    }

    /// Wire a tracker over the files in `data_dir`: the SQLite store, the
    /// device key and, for the file backend, the mirror document.
    pub fn open(config: Config, data_dir: &Path) -> Result<Self, CoreError> {
        let db = SleepDb::open_at(&data_dir.join(DB_FILE))?;
        let crypto = CryptoManager::load_or_create_at(data_dir)?;
        let mirror = remote::from_config(&config.remote, data_dir)?;
        Ok(Self::builder(db, crypto, mirror).config(config).build())
    }

    pub fn db(&self) -> &SharedDb {
        &self.db
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn notifications(&self) -> &NotificationScheduler {
        &self.notifications
    }

    pub fn sampler(&self) -> &SamplerController {
        self.notifications.sampler()
    }

    pub fn tasks(&self) -> &TaskScheduler {
        &self.tasks
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn sync_state(&self) -> Result<SyncState, CoreError> {
        self.sync.state(&self.db)
    }

    pub fn username(&self) -> Result<Option<String>, CoreError> {
        self.prefs.username(&lock(&self.db))
    }

    /// The stored user id, if someone is logged in.
    pub fn user_id(&self) -> Result<Option<String>, CoreError> {
        Ok(self
            .prefs
            .user_id(&lock(&self.db))?
            .filter(|id| !id.is_empty()))
    }

    pub fn is_logged_in(&self) -> Result<bool, CoreError> {
        Ok(self.user_id()?.is_some())
    }

    pub fn windows(&self) -> Result<Vec<ScheduleWindow>, CoreError> {
        Ok(lock(&self.db).list_windows()?)
    }

    pub fn window_for_day(&self, day: Weekday) -> Result<ScheduleWindow, CoreError> {
        lock(&self.db)
            .get_window_by_day(day)?
            .ok_or_else(|| ValidationError::UnknownWindow(day_name(day).to_string()).into())
    }

    /// Reconcile with the mirror if logged in, arm every boundary, align the
    /// sampler with the current moment and start periodic cleanup.
    pub async fn startup(&self) -> Result<Option<SyncOutcome>, CoreError> {
        let outcome = match self.user_id()? {
            Some(user_id) => Some(self.sync.sync_after_login(&self.db, &user_id).await?),
            None => None,
        };
        self.arm_all()?;
        cleanup::schedule_cleanup(&self.tasks, self.db.clone(), &self.config.retention);
        self.refresh()?;
        tracing::info!(?outcome, "tracker started");
        Ok(outcome)
    }

    /// Cancel every background task and release the sensors.
    pub fn shutdown(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.sampler().stop();
        self.tasks.cancel_all();
        tracing::info!("tracker stopped");
    }

    fn arm_all(&self) -> Result<(), CoreError> {
        let windows = self.windows()?;
        let now = self.now();
        self.notifications.reschedule_all(&windows, now);
        self.notifications.align_sampler(&windows, now);
        self.armed.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Whether this tracker owns the sampler and boundary tasks.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// The sampler state an edit is judged against: the live one when armed,
    /// otherwise the one the stored schedule implies for `now`.
    fn sampler_baseline(&self, now: NaiveDateTime) -> Result<SamplerStatus, CoreError> {
        if self.is_armed() {
            return Ok(self.sampler().status());
        }
        let active = self.windows()?.iter().any(|w| w.covers(now));
        Ok(if active {
            SamplerStatus::Running
        } else {
            SamplerStatus::Idle
        })
    }

    /// Poll the store every `period` and re-arm when another process has
    /// written windows since the last look.
    pub fn watch_store(&self, period: Duration) -> Result<(), CoreError> {
        let seen = Arc::new(AtomicI64::new(lock(&self.db).windows_revision()?));
        let db = self.db.clone();
        let notifications = self.notifications.clone();
        let view = self.view.clone();
        self.tasks.schedule_periodic(STORE_WATCH_KEY, period, move || -> TaskFuture {
            let db = db.clone();
            let notifications = notifications.clone();
            let view = view.clone();
            let seen = seen.clone();
            Box::pin(async move {
                if let Err(e) = reload_if_changed(&db, &notifications, &view, &seen) {
                    tracing::warn!(error = %e, "store check failed");
                }
            })
        });
        Ok(())
    }

    /// Create the default window for every night that has none. Returns how
    /// many were created; a second call creates nothing.
    pub fn initialize_week(&self) -> Result<usize, CoreError> {
        let (sleep, wake) = self.config.default_times();
        let db = lock(&self.db);
        let mut inserted = 0;
        for window in default_week(sleep, wake) {
            if db.insert_window(&window)?.is_some() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Record a successful sign-in, create the default week and reconcile
    /// with the mirror.
    pub async fn login(&self, username: &str, user_id: &str) -> Result<SyncOutcome, CoreError> {
        let blank: Vec<String> = [("username", username), ("user_id", user_id)]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field.to_string())
            .collect();
        if !blank.is_empty() {
            return Err(ValidationError::EmptyCredentials { fields: blank }.into());
        }

        self.prefs.save_credentials(&lock(&self.db), username, user_id)?;
        let created = self.initialize_week()?;
        let outcome = self.sync.sync_after_login(&self.db, user_id).await?;
        self.arm_all()?;
        self.refresh()?;
        tracing::info!(username, created, ?outcome, "logged in");
        Ok(outcome)
    }

    /// Forget the user. Local windows and their boundaries stay armed.
    pub fn logout(&self) -> Result<(), CoreError> {
        self.prefs.clear_credentials(&lock(&self.db))?;
        self.sync.forget(&self.db)?;
        self.refresh()?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Re-run the post-login reconciliation on demand.
    pub async fn sync_now(&self) -> Result<SyncOutcome, CoreError> {
        let user_id = self.user_id()?.ok_or(ValidationError::NotLoggedIn)?;
        let outcome = self.sync.sync_after_login(&self.db, &user_id).await?;
        self.arm_all()?;
        self.refresh()?;
        Ok(outcome)
    }

    /// Wipe preferences and windows locally and the user's documents
    /// remotely. Motion samples are kept. Returns the number of remote
    /// documents deleted.
    pub async fn clear_all_data(&self) -> Result<usize, CoreError> {
        let user_id = self.user_id()?;
        self.prefs.clear_all(&lock(&self.db))?;
        lock(&self.db).delete_all_windows()?;
        self.notifications.cancel_all();
        self.sampler().stop();

        let deleted = match user_id {
            Some(user_id) => self.sync.delete_remote(&user_id).await,
            None => 0,
        };
        self.sync.forget(&self.db)?;
        self.refresh()?;
        tracing::info!(remote_deleted = deleted, "cleared all data");
        Ok(deleted)
    }

    pub fn toggle_dark_mode(&self) -> Result<bool, CoreError> {
        let enabled = {
            let db = lock(&self.db);
            let enabled = !self.prefs.dark_mode(&db)?;
            self.prefs.set_dark_mode(&db, enabled)?;
            enabled
        };
        self.refresh()?;
        Ok(enabled)
    }

    /// Store a window for a night that has none. `Ok(None)` if that night
    /// already has a window.
    pub async fn add_window(&self, window: ScheduleWindow) -> Result<Option<WindowChange>, CoreError> {
        let now = self.now();
        let baseline = self.sampler_baseline(now)?;
        let inserted = lock(&self.db).insert_window(&window)?;
        let Some(stored) = inserted else {
            tracing::info!(day = day_name(window.start_day), "night already has a window");
            return Ok(None);
        };

        let action = evaluate_edit(None, &stored, now, baseline);
        if self.is_armed() {
            self.notifications.apply(action);
            self.notifications.reschedule_window(&stored, now);
        }

        let remote = match self.user_id()? {
            Some(user_id) => Some(self.sync.push_created(&self.db, &user_id, &stored).await?),
            None => None,
        };
        self.refresh()?;
        Ok(Some(WindowChange {
            window: stored,
            sampler: action,
            remote,
        }))
    }

    /// Apply an edit to an existing window (matched by id).
    pub async fn update_window(&self, window: ScheduleWindow) -> Result<WindowChange, CoreError> {
        let previous = lock(&self.db)
            .get_window(window.id)?
            .ok_or_else(|| ValidationError::UnknownWindow(day_name(window.start_day).to_string()))?;
        let now = self.now();
        let baseline = self.sampler_baseline(now)?;
        lock(&self.db).update_window(&window)?;

        let action = evaluate_edit(Some(&previous), &window, now, baseline);
        if self.is_armed() {
            self.notifications.apply(action);
            if previous.start_day != window.start_day {
                self.notifications.cancel_day(previous.start_day);
            }
            self.notifications.reschedule_window(&window, now);
        }

        let remote = match self.user_id()? {
            Some(user_id) => Some(self.sync.push_updated(&self.db, &user_id, &window).await?),
            None => None,
        };
        self.refresh()?;
        Ok(WindowChange {
            window,
            sampler: action,
            remote,
        })
    }

    pub async fn remove_window(&self, id: i64) -> Result<WindowChange, CoreError> {
        let (previous, link) = {
            let db = lock(&self.db);
            (db.get_window(id)?, db.remote_link(id)?)
        };
        let previous = previous.ok_or_else(|| ValidationError::UnknownWindow(id.to_string()))?;
        let now = self.now();
        let baseline = self.sampler_baseline(now)?;
        lock(&self.db).delete_window(id)?;

        // a deleted window behaves like a disabled one for the sampler
        let mut gone = previous.clone();
        gone.enabled = false;
        let action = evaluate_edit(Some(&previous), &gone, now, baseline);
        if self.is_armed() {
            self.notifications.apply(action);
            self.notifications.cancel_day(previous.start_day);
        }

        let remote = match self.user_id()? {
            Some(_) => Some(self.sync.push_deleted(&self.db, id, link.as_deref()).await?),
            None => None,
        };
        self.refresh()?;
        Ok(WindowChange {
            window: previous,
            sampler: action,
            remote,
        })
    }

    /// Count one disturbance for `day`, or for today's label.
    pub fn record_motion(&self, day: Option<&str>) -> Result<MotionSample, CoreError> {
        let now = self.now();
        let day = day.map(str::to_string).unwrap_or_else(|| day_label(now));
        let sample = lock(&self.db).record_motion(&day, local_to_utc(now))?;
        self.refresh()?;
        Ok(sample)
    }

    pub fn reset_motion(&self, day: Option<&str>) -> Result<MotionSample, CoreError> {
        let now = self.now();
        let day = day.map(str::to_string).unwrap_or_else(|| day_label(now));
        let sample = lock(&self.db).reset_motion(&day, local_to_utc(now))?;
        self.refresh()?;
        Ok(sample)
    }

    /// Listen to the sensors once for `window`, outside the periodic task.
    pub async fn sample_once(&self, window: Duration) -> Result<Option<MotionSample>, CoreError> {
        let thresholds = Thresholds {
            acceleration: self.config.sampler.accel_threshold,
            light: self.config.sampler.light_threshold,
        };
        let sampler = MotionSampler::new(self.db.clone(), self.hub.clone(), thresholds, window);
        let sample = sampler.run_once(self.now()).await?;
        self.refresh()?;
        Ok(sample)
    }

    pub fn clean_old_data(&self) -> Result<usize, CoreError> {
        let removed = cleanup::clean_old_data(
            &self.db,
            local_to_utc(self.now()),
            self.config.retention.days,
        )?;
        self.refresh()?;
        Ok(removed)
    }

    pub fn stats(&self) -> Result<SleepStats, CoreError> {
        let (windows, motion) = {
            let db = lock(&self.db);
            (db.list_windows()?, db.motion_stats()?)
        };
        let enabled: Vec<&ScheduleWindow> = windows.iter().filter(|w| w.enabled).collect();
        let average_sleep_minutes = if enabled.is_empty() {
            None
        } else {
            let total: i64 = enabled.iter().map(|w| w.night_length().num_minutes()).sum();
            Some(total as f64 / enabled.len() as f64)
        };
        Ok(SleepStats {
            windows: windows.len(),
            enabled_windows: enabled.len(),
            average_sleep_minutes,
            motion,
        })
    }

    /// Re-read the store into the view.
    pub fn refresh(&self) -> Result<(), CoreError> {
        let (windows, samples, logged_in, dark_mode) = {
            let db = lock(&self.db);
            (
                db.list_windows()?,
                db.list_samples()?,
                self.prefs.is_logged_in(&db)?,
                self.prefs.dark_mode(&db)?,
            )
        };
        self.view.set_windows(windows);
        self.view.set_motion(samples);
        self.view.set_logged_in(logged_in);
        self.view.set_dark_mode(dark_mode);
        Ok(())
    }
}

/// Re-arm from the store if its window revision moved past `seen`.
fn reload_if_changed(
    db: &Mutex<SleepDb>,
    notifications: &NotificationScheduler,
    view: &ViewState,
    seen: &AtomicI64,
) -> Result<bool, CoreError> {
    let revision = lock(db).windows_revision()?;
    if seen.swap(revision, Ordering::SeqCst) == revision {
        return Ok(false);
    }
    let windows = lock(db).list_windows()?;
    let now = notifications.now();
    notifications.reschedule_all(&windows, now);
    notifications.align_sampler(&windows, now);
    tracing::info!(revision, windows = windows.len(), "windows changed in the store; re-armed");
    view.set_windows(windows);
    Ok(true)
}
