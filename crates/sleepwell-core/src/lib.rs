//! # SleepWell Core Library
//!
//! Core logic for the SleepWell sleep tracker. Every operation is available
//! through the `sleepwell-cli` binary, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Schedule**: seven weekly windows, one per night, each spanning a sleep
//!   and a wake boundary
//! - **Storage**: SQLite store for windows, motion samples and encrypted
//!   preferences; TOML configuration
//! - **Remote mirror**: per-user copy of the windows in a document
//!   collection, reconciled after login by the [`Synchronizer`]
//! - **Notifications**: one-shot tasks per boundary that notify and start or
//!   stop the motion sampler
//! - **Sampler**: periodic accelerometer/light check counting disturbances
//!
//! ## Key Components
//!
//! - [`SleepTracker`]: coordinator behind every user-facing operation
//! - [`SleepDb`]: local persistence
//! - [`Config`]: application configuration
//! - [`RemoteMirror`]: trait implemented by the Firestore, file and
//!   in-memory mirrors

pub mod auth;
pub mod cleanup;
pub mod error;
pub mod notifications;
pub mod prefs;
pub mod remote;
pub mod sampler;
pub mod schedule;
pub mod storage;
pub mod sync;
pub mod tasks;
pub mod tracker;

pub use auth::{LoginForm, SignupForm};
pub use error::{
    ConfigError, CoreError, CryptoError, DatabaseError, RemoteError, SensorError, ValidationError,
};
pub use notifications::{
    evaluate_edit, BoundaryKind, LogNotifier, NotificationScheduler, Notifier, SamplerAction,
};
pub use prefs::{CryptoManager, UserPreferences};
pub use remote::{FileMirror, FirestoreMirror, MemoryMirror, RemoteMirror, RemoteScheduleWindow};
pub use sampler::{
    IioSensorHub, MotionSampler, SamplerController, SamplerStatus, ScriptedSensors, SensorHub,
    SensorReading, Thresholds,
};
pub use schedule::ScheduleWindow;
pub use storage::{data_dir, Config, MotionSample, MotionStats, SleepDb};
pub use sync::{PushOutcome, SyncOutcome, SyncState, Synchronizer};
pub use tasks::TaskScheduler;
pub use tracker::{SleepStats, SleepTracker, TrackerBuilder, ViewState, WindowChange};
