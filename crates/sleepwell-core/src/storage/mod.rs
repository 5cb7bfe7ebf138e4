mod config;
pub mod database;
pub mod migrations;
pub mod motion_db;
pub mod schedule_db;

pub use config::{
    Config, NotificationsConfig, RemoteBackend, RemoteConfig, RetentionConfig, SamplerConfig,
    ScheduleConfig, SensorBackend,
};
pub use database::SleepDb;
pub use motion_db::{DayCount, MotionSample, MotionStats};

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ConfigError;

/// The store as shared between the tracker and background tasks.
pub type SharedDb = Arc<Mutex<SleepDb>>;

/// Lock a shared store. A panic in another holder does not corrupt SQLite
/// state, so poisoning is ignored.
pub fn lock(db: &Mutex<SleepDb>) -> MutexGuard<'_, SleepDb> {
    db.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn shared(db: SleepDb) -> SharedDb {
    Arc::new(Mutex::new(db))
}

/// Returns `~/.config/sleepwell[-dev]/` based on SLEEPWELL_ENV.
///
/// Set SLEEPWELL_ENV=dev to use the development data directory, or
/// SLEEPWELL_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("SLEEPWELL_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("SLEEPWELL_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("sleepwell-dev")
            } else {
                base_dir.join("sleepwell")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
