use clap::Subcommand;

use super::{open_tracker, CliResult};

#[derive(Subcommand)]
pub enum DataAction {
    /// Delete preferences, local windows and the user's remote windows
    Wipe {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

pub async fn run(action: DataAction) -> CliResult {
    match action {
        DataAction::Wipe { yes } => {
            if !yes {
                return Err("refusing to wipe without --yes".into());
            }
            let tracker = open_tracker()?;
            let remote = tracker.clear_all_data().await?;
            println!("wiped local data and {remote} remote windows");
        }
    }
    Ok(())
}
