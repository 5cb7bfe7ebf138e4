//! TOML-based application configuration.
//!
//! Stores:
//! - Default sleep/wake times for newly created windows
//! - Motion sampler period, sampling window, thresholds and sensor backend
//! - Motion sample retention
//! - Remote mirror backend settings
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::schedule::{self, DEFAULT_SLEEP_TIME, DEFAULT_WAKE_TIME};

/// Defaults for windows created at first login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_sleep_time")]
    pub sleep_time: String,
    #[serde(default = "default_wake_time")]
    pub wake_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackend {
    /// Linux industrial-I/O sysfs devices.
    Iio,
    /// No sensors; sampling invocations never detect anything.
    None,
}

/// Motion sampler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    #[serde(default = "default_period_minutes")]
    pub period_minutes: u64,
    /// How long one invocation listens to the sensors.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Acceleration magnitude above which motion counts (m/s^2).
    #[serde(default = "default_accel_threshold")]
    pub accel_threshold: f64,
    /// Ambient light above which the room counts as lit (lux).
    #[serde(default = "default_light_threshold")]
    pub light_threshold: f64,
    #[serde(default = "default_sensor_backend")]
    pub sensor_backend: SensorBackend,
    #[serde(default = "default_iio_path")]
    pub iio_path: String,
    #[serde(default = "default_poll_millis")]
    pub poll_millis: u64,
}

/// Motion sample retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub days: u32,
    #[serde(default = "default_retention_days")]
    pub cleanup_period_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    /// JSON document collection in the data directory.
    File,
    /// Cloud Firestore REST API.
    Firestore,
}

/// Remote mirror configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_backend")]
    pub backend: RemoteBackend,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub api_key: String,
    /// ID token issued by the auth provider.
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default = "default_firestore_base_url")]
    pub base_url: String,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_sleep_time() -> String {
    DEFAULT_SLEEP_TIME.into()
}
fn default_wake_time() -> String {
    DEFAULT_WAKE_TIME.into()
}
fn default_period_minutes() -> u64 {
    10
}
fn default_window_secs() -> u64 {
    10
}
fn default_accel_threshold() -> f64 {
    12.0
}
fn default_light_threshold() -> f64 {
    100.0
}
fn default_sensor_backend() -> SensorBackend {
    SensorBackend::Iio
}
fn default_iio_path() -> String {
    "/sys/bus/iio/devices".into()
}
fn default_poll_millis() -> u64 {
    200
}
fn default_retention_days() -> u32 {
    7
}
fn default_remote_backend() -> RemoteBackend {
    RemoteBackend::File
}
fn default_collection() -> String {
    "dayTimes".into()
}
fn default_firestore_base_url() -> String {
    "https://firestore.googleapis.com/v1".into()
}
fn default_true() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sleep_time: default_sleep_time(),
            wake_time: default_wake_time(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period_minutes: default_period_minutes(),
            window_secs: default_window_secs(),
            accel_threshold: default_accel_threshold(),
            light_threshold: default_light_threshold(),
            sensor_backend: default_sensor_backend(),
            iio_path: default_iio_path(),
            poll_millis: default_poll_millis(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
            cleanup_period_days: default_retention_days(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: default_remote_backend(),
            collection: default_collection(),
            project_id: String::new(),
            api_key: String::new(),
            bearer_token: String::new(),
            base_url: default_firestore_base_url(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(unknown());
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default config location.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key (in memory only).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// field's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check values that serde alone can't.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("schedule.sleep_time", &self.schedule.sleep_time),
            ("schedule.wake_time", &self.schedule.wake_time),
        ] {
            schedule::parse_time(value).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        }
        if self.sampler.period_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sampler.period_minutes".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.retention.cleanup_period_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retention.cleanup_period_days".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Parsed default sleep and wake times.
    pub fn default_times(&self) -> (chrono::NaiveTime, chrono::NaiveTime) {
        let fallback_sleep = chrono::NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default();
        let fallback_wake = chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default();
        (
            schedule::parse_time(&self.schedule.sleep_time).unwrap_or(fallback_sleep),
            schedule::parse_time(&self.schedule.wake_time).unwrap_or(fallback_wake),
        )
    }
}
