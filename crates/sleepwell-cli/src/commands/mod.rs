pub mod auth;
pub mod config;
pub mod daemon;
pub mod data;
pub mod motion;
pub mod prefs;
pub mod sync;
pub mod window;

use sleepwell_core::{data_dir, Config, SleepTracker};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the tracker over the data directory and its config file.
pub fn open_tracker() -> Result<SleepTracker, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let dir = data_dir()?;
    Ok(SleepTracker::open(config, &dir)?)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
