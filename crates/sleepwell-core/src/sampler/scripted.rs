//! Sensor hub that replays a fixed list of readings.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;

use super::{SensorHub, SensorReading};
use crate::error::SensorError;

/// Each registration receives the whole script, then the channel closes.
/// An empty script models a device without sensors.
pub struct ScriptedSensors {
    script: Vec<SensorReading>,
    registrations: AtomicUsize,
    registered: AtomicBool,
}

impl ScriptedSensors {
    pub fn new(script: Vec<SensorReading>) -> Self {
        Self {
            script,
            registrations: AtomicUsize::new(0),
            registered: AtomicBool::new(false),
        }
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }
}

impl SensorHub for ScriptedSensors {
    fn register(&self) -> Result<mpsc::Receiver<SensorReading>, SensorError> {
        if self.registered.swap(true, Ordering::SeqCst) {
            return Err(SensorError::AlreadyRegistered);
        }
        self.registrations.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(self.script.len().max(1));
        for reading in self.script.iter().copied() {
            // capacity covers the whole script
            let _ = tx.try_send(reading);
        }
        Ok(rx)
    }

    fn unregister(&self) {
        self.registered.store(false, Ordering::SeqCst);
    }
}
