use clap::Subcommand;
use sleepwell_core::schedule::{day_name, format_time, parse_time, parse_weekday};
use sleepwell_core::{ScheduleWindow, WindowChange};

use super::{open_tracker, print_json, CliResult};

#[derive(Subcommand)]
pub enum WindowAction {
    /// List the week's windows
    List {
        #[arg(long)]
        json: bool,
    },
    /// Change a night's sleep and/or wake time
    Set {
        /// Start day (e.g. "monday", "MON")
        day: String,
        #[arg(long)]
        sleep: Option<String>,
        #[arg(long)]
        wake: Option<String>,
    },
    /// Enable a night
    Enable { day: String },
    /// Disable a night
    Disable { day: String },
    /// Delete a night's window
    Remove { day: String },
    /// Add a window for a night that has none
    Add {
        day: String,
        /// Defaults to the following day
        #[arg(long)]
        end_day: Option<String>,
        #[arg(long, default_value = "22:00")]
        sleep: String,
        #[arg(long, default_value = "07:00")]
        wake: String,
        #[arg(long)]
        disabled: bool,
    },
}

fn print_table(windows: &[ScheduleWindow]) {
    if windows.is_empty() {
        println!("no windows (log in to create the default week)");
        return;
    }
    println!("{:<10} {:<10} {:<6} {:<6} {}", "START", "END", "SLEEP", "WAKE", "ENABLED");
    for w in windows {
        println!(
            "{:<10} {:<10} {:<6} {:<6} {}",
            day_name(w.start_day),
            day_name(w.end_day),
            format_time(w.sleep_time),
            format_time(w.wake_time),
            if w.enabled { "yes" } else { "no" }
        );
    }
}

pub async fn run(action: WindowAction) -> CliResult {
    let tracker = open_tracker()?;
    let change: WindowChange = match action {
        WindowAction::List { json } => {
            let windows = tracker.windows()?;
            if json {
                print_json(&windows)?;
            } else {
                print_table(&windows);
            }
            return Ok(());
        }
        WindowAction::Set { day, sleep, wake } => {
            let mut window = tracker.window_for_day(parse_weekday(&day)?)?;
            if let Some(sleep) = sleep {
                window.sleep_time = parse_time(&sleep)?;
            }
            if let Some(wake) = wake {
                window.wake_time = parse_time(&wake)?;
            }
            tracker.update_window(window).await?
        }
        WindowAction::Enable { day } => {
            let mut window = tracker.window_for_day(parse_weekday(&day)?)?;
            window.enabled = true;
            tracker.update_window(window).await?
        }
        WindowAction::Disable { day } => {
            let mut window = tracker.window_for_day(parse_weekday(&day)?)?;
            window.enabled = false;
            tracker.update_window(window).await?
        }
        WindowAction::Remove { day } => {
            let window = tracker.window_for_day(parse_weekday(&day)?)?;
            tracker.remove_window(window.id).await?
        }
        WindowAction::Add {
            day,
            end_day,
            sleep,
            wake,
            disabled,
        } => {
            let start_day = parse_weekday(&day)?;
            let end_day = match end_day {
                Some(end) => parse_weekday(&end)?,
                None => ScheduleWindow::default_end_day(start_day),
            };
            let window = ScheduleWindow::new(
                start_day,
                end_day,
                parse_time(&sleep)?,
                parse_time(&wake)?,
                !disabled,
            );
            match tracker.add_window(window).await? {
                Some(change) => change,
                None => return Err(format!("{} already has a window", day_name(start_day)).into()),
            }
        }
    };
    print_json(&change)
}
