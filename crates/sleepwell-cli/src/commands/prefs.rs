use clap::Subcommand;

use super::{open_tracker, CliResult};

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Show the dark-mode flag, or flip it with `toggle`
    DarkMode {
        #[arg(value_parser = ["toggle"])]
        toggle: Option<String>,
    },
}

pub fn run(action: PrefsAction) -> CliResult {
    let tracker = open_tracker()?;
    match action {
        PrefsAction::DarkMode { toggle: Some(_) } => {
            let enabled = tracker.toggle_dark_mode()?;
            println!("dark mode: {}", if enabled { "on" } else { "off" });
        }
        PrefsAction::DarkMode { toggle: None } => {
            tracker.refresh()?;
            println!("dark mode: {}", if tracker.view().dark_mode() { "on" } else { "off" });
        }
    }
    Ok(())
}
