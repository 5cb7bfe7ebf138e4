//! Linux industrial-I/O sensors read from sysfs.
//!
//! An accelerometer device exposes `in_accel_{x,y,z}_raw` and an optional
//! `in_accel_scale`; a light sensor exposes `in_illuminance_input` (lux) or
//! `in_illuminance_raw` with an optional `in_illuminance_scale`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{SensorHub, SensorReading};
use crate::error::SensorError;

#[derive(Debug, Default, Clone, PartialEq)]
struct Devices {
    accel: Option<PathBuf>,
    light: Option<PathBuf>,
}

pub struct IioSensorHub {
    root: PathBuf,
    poll: Duration,
    active: Mutex<Option<CancellationToken>>,
}

impl IioSensorHub {
    pub fn new(root: PathBuf, poll: Duration) -> Self {
        Self {
            root,
            poll,
            active: Mutex::new(None),
        }
    }

    fn discover(&self) -> Result<Devices, SensorError> {
        let unavailable = || SensorError::Unavailable(self.root.display().to_string());
        let entries = fs::read_dir(&self.root).map_err(|_| unavailable())?;

        let mut devices = Devices::default();
        let mut dirs: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        dirs.sort();
        for dir in dirs {
            if devices.accel.is_none() && dir.join("in_accel_x_raw").exists() {
                devices.accel = Some(dir.clone());
            }
            if devices.light.is_none()
                && (dir.join("in_illuminance_input").exists()
                    || dir.join("in_illuminance_raw").exists())
            {
                devices.light = Some(dir);
            }
        }

        if devices.accel.is_none() && devices.light.is_none() {
            return Err(unavailable());
        }
        Ok(devices)
    }
}

fn read_value(path: &Path) -> Result<f64, SensorError> {
    let raw = fs::read_to_string(path).map_err(|source| SensorError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    raw.trim()
        .parse::<f64>()
        .map_err(|e| SensorError::ReadFailed {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
}

fn read_scale(path: &Path) -> f64 {
    if path.exists() {
        read_value(path).unwrap_or(1.0)
    } else {
        1.0
    }
}

fn read_acceleration(dir: &Path) -> Result<SensorReading, SensorError> {
    let scale = read_scale(&dir.join("in_accel_scale"));
    Ok(SensorReading::Acceleration {
        x: read_value(&dir.join("in_accel_x_raw"))? * scale,
        y: read_value(&dir.join("in_accel_y_raw"))? * scale,
        z: read_value(&dir.join("in_accel_z_raw"))? * scale,
    })
}

fn read_light(dir: &Path) -> Result<SensorReading, SensorError> {
    let input = dir.join("in_illuminance_input");
    let lux = if input.exists() {
        read_value(&input)?
    } else {
        read_value(&dir.join("in_illuminance_raw"))? * read_scale(&dir.join("in_illuminance_scale"))
    };
    Ok(SensorReading::Light { lux })
}

fn poll_devices(devices: &Devices) -> Vec<SensorReading> {
    let mut readings = Vec::with_capacity(2);
    let polled = [
        devices.accel.as_deref().map(read_acceleration),
        devices.light.as_deref().map(read_light),
    ];
    for result in polled.into_iter().flatten() {
        match result {
            Ok(reading) => readings.push(reading),
            Err(e) => tracing::debug!(error = %e, "sensor read failed"),
        }
    }
    readings
}

impl SensorHub for IioSensorHub {
    fn register(&self) -> Result<mpsc::Receiver<SensorReading>, SensorError> {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        if active.is_some() {
            return Err(SensorError::AlreadyRegistered);
        }
        let devices = self.discover()?;
        tracing::debug!(?devices, "registered iio sensors");

        let token = CancellationToken::new();
        let child = token.clone();
        let poll = self.poll;
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        for reading in poll_devices(&devices) {
                            if tx.send(reading).await.is_err() {
                                return;
                            }
                        }
                    }
                    _ = child.cancelled() => return,
                }
            }
        });

        *active = Some(token);
        Ok(rx)
    }

    fn unregister(&self) {
        if let Some(token) = self.active.lock().unwrap_or_else(|p| p.into_inner()).take() {
            token.cancel();
        }
    }
}
