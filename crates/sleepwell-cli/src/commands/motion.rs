use std::time::Duration;

use clap::Subcommand;

use super::{open_tracker, print_json, CliResult};

#[derive(Subcommand)]
pub enum MotionAction {
    /// Count one disturbance
    Record {
        /// Day label (defaults to today, e.g. "Monday")
        #[arg(long)]
        day: Option<String>,
    },
    /// Start a day's counter again from zero
    Reset {
        #[arg(long)]
        day: Option<String>,
    },
    /// Recent samples, newest first
    List,
    /// Window and disturbance statistics
    Stats,
    /// Delete samples past the retention period
    Cleanup,
    /// Listen to the sensors once
    Sample {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

pub async fn run(action: MotionAction) -> CliResult {
    let tracker = open_tracker()?;
    match action {
        MotionAction::Record { day } => print_json(&tracker.record_motion(day.as_deref())?)?,
        MotionAction::Reset { day } => print_json(&tracker.reset_motion(day.as_deref())?)?,
        MotionAction::List => {
            tracker.refresh()?;
            print_json(&tracker.view().motion())?
        }
        MotionAction::Stats => print_json(&tracker.stats()?)?,
        MotionAction::Cleanup => {
            let removed = tracker.clean_old_data()?;
            println!("removed {removed} samples");
        }
        MotionAction::Sample { seconds } => {
            match tracker.sample_once(Duration::from_secs(seconds)).await? {
                Some(sample) => print_json(&sample)?,
                None => println!("no disturbance"),
            }
        }
    }
    Ok(())
}
