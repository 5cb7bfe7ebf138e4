//! Motion sample retention.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::storage::{lock, RetentionConfig, SharedDb, SleepDb};
use crate::tasks::{TaskFuture, TaskScheduler};

pub const CLEANUP_WORKER_KEY: &str = "cleanup_worker";

/// Delete samples captured more than `retention_days` before `now`.
pub fn clean_old_data(
    db: &Mutex<SleepDb>,
    now: DateTime<Utc>,
    retention_days: u32,
) -> Result<usize, CoreError> {
    let removed = lock(db).clean_old_samples(now, retention_days)?;
    if removed > 0 {
        tracing::info!(removed, retention_days, "pruned old motion samples");
    }
    Ok(removed)
}

/// Run [`clean_old_data`] now and then every `cleanup_period_days`.
pub fn schedule_cleanup(tasks: &TaskScheduler, db: SharedDb, retention: &RetentionConfig) {
    let days = retention.days;
    let period = Duration::from_secs(u64::from(retention.cleanup_period_days.max(1)) * 24 * 60 * 60);
    tasks.schedule_periodic(CLEANUP_WORKER_KEY, period, move || -> TaskFuture {
        let db = db.clone();
        Box::pin(async move {
            if let Err(e) = clean_old_data(&db, Utc::now(), days) {
                tracing::warn!(error = %e, "motion sample cleanup failed");
            }
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::shared;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn keeps_samples_inside_retention() {
        let db = shared(SleepDb::open_memory().unwrap());
        let now = Utc::now();
        lock(&db)
            .reset_motion("Monday", now - ChronoDuration::days(8))
            .unwrap();
        lock(&db)
            .record_motion("Tuesday", now - ChronoDuration::days(6))
            .unwrap();

        assert_eq!(clean_old_data(&db, now, 7).unwrap(), 1);
        let left = lock(&db).list_samples().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].day, "Tuesday");
        assert_eq!(clean_old_data(&db, now, 7).unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_cleanup_runs_immediately() {
        let db = shared(SleepDb::open_memory().unwrap());
        lock(&db)
            .reset_motion("Monday", Utc::now() - ChronoDuration::days(30))
            .unwrap();

        let tasks = TaskScheduler::new();
        schedule_cleanup(&tasks, db.clone(), &RetentionConfig::default());
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(lock(&db).list_samples().unwrap().is_empty());
        assert!(tasks.is_scheduled(CLEANUP_WORKER_KEY));
        tasks.cancel_all();
    }
}
