use std::time::Duration;

use super::{open_tracker, CliResult};

/// How often the daemon looks for window edits made by other commands.
const STORE_POLL: Duration = Duration::from_secs(5);

/// Arm every boundary and keep sampling until interrupted.
pub async fn run() -> CliResult {
    let tracker = open_tracker()?;
    if let Some(outcome) = tracker.startup().await? {
        tracing::info!(?outcome, "startup sync finished");
    }
    tracker.watch_store(STORE_POLL)?;
    tracing::info!(
        boundaries = tracker.notifications().pending().len(),
        "daemon running; press Ctrl-C to stop"
    );

    let mut status = tracker.sampler().subscribe();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                tracing::info!(sampler = ?current, "sampler status changed");
            }
        }
    }

    tracker.shutdown();
    Ok(())
}
