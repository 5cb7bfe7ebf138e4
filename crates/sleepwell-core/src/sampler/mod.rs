//! Motion sampling during active windows.
//!
//! While a window is active the controller runs the sampler every period
//! (10 minutes by default). Each invocation listens to the accelerometer and
//! light sensor for a short window and counts one disturbance for the current
//! day if either reading crosses its threshold.

mod iio;
mod scripted;

pub use iio::IioSensorHub;
pub use scripted::ScriptedSensors;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::error::{CoreError, SensorError};
use crate::schedule::{day_label, local_to_utc, Clock};
use crate::storage::{lock, MotionSample, SamplerConfig, SensorBackend, SharedDb};
use crate::tasks::{TaskFuture, TaskScheduler};

/// Task key of the periodic sampler.
pub const DETECTION_WORKER_KEY: &str = "detection_worker";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sensor", rename_all = "snake_case")]
pub enum SensorReading {
    /// m/s^2 per axis.
    Acceleration { x: f64, y: f64, z: f64 },
    Light { lux: f64 },
}

impl SensorReading {
    pub fn acceleration_magnitude(&self) -> Option<f64> {
        match self {
            SensorReading::Acceleration { x, y, z } => Some((x * x + y * y + z * z).sqrt()),
            SensorReading::Light { .. } => None,
        }
    }
}

/// Platform sensors.
///
/// `register` starts delivery of both sensors into the returned channel;
/// `unregister` stops it. The channel closing ends the invocation early.
pub trait SensorHub: Send + Sync {
    fn register(&self) -> Result<mpsc::Receiver<SensorReading>, SensorError>;
    fn unregister(&self);
}

/// Build the hub selected in config.
pub fn hub_from_config(config: &SamplerConfig) -> Arc<dyn SensorHub> {
    match config.sensor_backend {
        SensorBackend::Iio => Arc::new(IioSensorHub::new(
            config.iio_path.clone().into(),
            Duration::from_millis(config.poll_millis),
        )),
        SensorBackend::None => Arc::new(ScriptedSensors::new(Vec::new())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub acceleration: f64,
    pub light: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            acceleration: 12.0,
            light: 100.0,
        }
    }
}

impl Thresholds {
    pub fn is_disturbance(&self, reading: &SensorReading) -> bool {
        match reading {
            SensorReading::Acceleration { .. } => reading
                .acceleration_magnitude()
                .is_some_and(|magnitude| magnitude > self.acceleration),
            SensorReading::Light { lux } => *lux > self.light,
        }
    }
}

/// One sampling invocation.
pub struct MotionSampler {
    db: SharedDb,
    hub: Arc<dyn SensorHub>,
    thresholds: Thresholds,
    window: Duration,
}

impl MotionSampler {
    pub fn new(db: SharedDb, hub: Arc<dyn SensorHub>, thresholds: Thresholds, window: Duration) -> Self {
        Self {
            db,
            hub,
            thresholds,
            window,
        }
    }

    pub fn from_config(db: SharedDb, hub: Arc<dyn SensorHub>, config: &SamplerConfig) -> Self {
        Self::new(
            db,
            hub,
            Thresholds {
                acceleration: config.accel_threshold,
                light: config.light_threshold,
            },
            Duration::from_secs(config.window_secs),
        )
    }

    /// Listen for one window; on disturbance bump the counter for `now`'s
    /// day label. Returns the updated sample if one was recorded.
    pub async fn run_once(&self, now: NaiveDateTime) -> Result<Option<MotionSample>, CoreError> {
        let mut readings = self.hub.register()?;
        let disturbed = self.listen(&mut readings).await;
        self.hub.unregister();

        if !disturbed {
            tracing::debug!("no disturbance this invocation");
            return Ok(None);
        }
        let day = day_label(now);
        let sample = lock(&self.db).record_motion(&day, local_to_utc(now))?;
        tracing::info!(day = %sample.day, count = sample.count, "disturbance recorded");
        Ok(Some(sample))
    }

    async fn listen(&self, readings: &mut mpsc::Receiver<SensorReading>) -> bool {
        let deadline = tokio::time::sleep(self.window);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                reading = readings.recv() => match reading {
                    Some(reading) if self.thresholds.is_disturbance(&reading) => return true,
                    Some(_) => {}
                    None => return false,
                },
                _ = &mut deadline => return false,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerStatus {
    #[default]
    Idle,
    Running,
}

/// Owns the sampler's running status. The status changes only through
/// [`SamplerController::start`] and [`SamplerController::stop`].
#[derive(Clone)]
pub struct SamplerController {
    sampler: Arc<MotionSampler>,
    tasks: TaskScheduler,
    period: Duration,
    clock: Clock,
    status: Arc<watch::Sender<SamplerStatus>>,
}

impl SamplerController {
    pub fn new(sampler: MotionSampler, tasks: TaskScheduler, period: Duration, clock: Clock) -> Self {
        let (status, _) = watch::channel(SamplerStatus::Idle);
        Self {
            sampler: Arc::new(sampler),
            tasks,
            period,
            clock,
            status: Arc::new(status),
        }
    }

    pub fn status(&self) -> SamplerStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SamplerStatus> {
        self.status.subscribe()
    }

    /// Start periodic sampling. Returns false if already running.
    pub fn start(&self) -> bool {
        if self.status() == SamplerStatus::Running {
            return false;
        }
        let sampler = self.sampler.clone();
        let clock = self.clock.clone();
        self.tasks
            .schedule_periodic(DETECTION_WORKER_KEY, self.period, move || -> TaskFuture {
                let sampler = sampler.clone();
                let now = clock();
                Box::pin(async move {
                    if let Err(e) = sampler.run_once(now).await {
                        tracing::warn!(error = %e, "motion sampling failed");
                    }
                })
            });
        self.status.send_replace(SamplerStatus::Running);
        tracing::info!(period_secs = self.period.as_secs(), "motion sampler started");
        true
    }

    /// Stop periodic sampling. Returns false if already idle.
    pub fn stop(&self) -> bool {
        if self.status() == SamplerStatus::Idle {
            return false;
        }
        self.tasks.cancel(DETECTION_WORKER_KEY);
        self.sampler.hub.unregister();
        self.status.send_replace(SamplerStatus::Idle);
        tracing::info!("motion sampler stopped");
        true
    }
}
