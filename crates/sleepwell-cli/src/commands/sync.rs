use super::{open_tracker, print_json, CliResult};

pub async fn run() -> CliResult {
    let tracker = open_tracker()?;
    let outcome = tracker.sync_now().await?;
    print_json(&outcome)
}
