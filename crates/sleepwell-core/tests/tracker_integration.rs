//! Integration tests for the tracker.
//!
//! Drives a full night: login, the sleep boundary starting the sampler,
//! disturbances being counted, the wake boundary stopping it, and a second
//! device picking the edited week up from the mirror, and a daemon following
//! edits made by another process over the same data directory.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use sleepwell_core::notifications::{boundary_key, RecordingNotifier};
use sleepwell_core::schedule::{fixed_clock, parse_time};
use sleepwell_core::storage::SensorBackend;
use sleepwell_core::{
    BoundaryKind, Config, CryptoManager, FileMirror, MemoryMirror, SamplerAction, SamplerStatus,
    ScriptedSensors, SensorReading, SleepDb, SleepTracker, SyncOutcome,
};
use tempfile::TempDir;

fn monday(h: u32, m: u32) -> NaiveDateTime {
    // 2024-01-01 is a Monday
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_night_flow() {
    let mirror = Arc::new(MemoryMirror::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let sensors = Arc::new(ScriptedSensors::new(vec![
        SensorReading::Acceleration { x: 0.0, y: 0.1, z: 9.8 },
        SensorReading::Light { lux: 450.0 },
    ]));
    let tracker = SleepTracker::builder(
        SleepDb::open_memory().unwrap(),
        CryptoManager::with_key([3u8; 32]),
        mirror.clone(),
    )
    .sensors(sensors.clone())
    .notifier(notifier.clone())
    .clock(fixed_clock(monday(21, 59)))
    .build();

    tracker.startup().await.unwrap();
    tracker.login("ana", "uid-ana").await.unwrap();
    assert_eq!(tracker.sampler().status(), SamplerStatus::Idle);

    // 22:00 Monday
    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;
    assert_eq!(tracker.sampler().status(), SamplerStatus::Running);
    assert_eq!(notifier.sent()[0].0, "Time to Sleep");
    assert!(sensors.registrations() >= 1);

    // one more sampling period
    tokio::time::sleep(Duration::from_secs(600)).await;
    settle().await;
    tracker.refresh().unwrap();
    let counted = tracker.stats().unwrap().motion.total_disturbances;
    assert!(counted >= 2, "expected at least two disturbances, got {counted}");
    assert_eq!(tracker.view().motion()[0].day, "Monday");

    // 07:00 Tuesday
    tokio::time::sleep(Duration::from_secs(9 * 3600)).await;
    settle().await;
    assert_eq!(tracker.sampler().status(), SamplerStatus::Idle);
    assert_eq!(notifier.sent().last().unwrap().0, "Time to Wake Up");
    assert!(!sensors.is_registered());

    tracker.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_second_device_adopts_mirrored_week() {
    let dir = TempDir::new().unwrap();
    let mirror_path = dir.path().join("dayTimes.json");

    let first = SleepTracker::builder(
        SleepDb::open_memory().unwrap(),
        CryptoManager::with_key([1u8; 32]),
        Arc::new(FileMirror::new(mirror_path.clone())),
    )
    .sensors(Arc::new(ScriptedSensors::new(Vec::new())))
    .clock(fixed_clock(monday(12, 0)))
    .build();
    first.login("ana", "uid-ana").await.unwrap();
    let mut saturday = first.window_for_day(Weekday::Sat).unwrap();
    saturday.sleep_time = parse_time("00:30").unwrap();
    saturday.enabled = false;
    first.update_window(saturday).await.unwrap();
    first.shutdown();

    let second = SleepTracker::builder(
        SleepDb::open_memory().unwrap(),
        CryptoManager::with_key([2u8; 32]),
        Arc::new(FileMirror::new(mirror_path)),
    )
    .sensors(Arc::new(ScriptedSensors::new(Vec::new())))
    .clock(fixed_clock(monday(12, 0)))
    .build();
    let outcome = second.login("ana", "uid-ana").await.unwrap();
    assert_eq!(outcome, SyncOutcome::Mirrored { windows: 7 });

    let adopted = second.window_for_day(Weekday::Sat).unwrap();
    assert!(!adopted.enabled);
    assert_eq!(adopted.sleep_time, parse_time("00:30").unwrap());
    assert_eq!(second.notifications().pending().len(), 12);
    second.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_open_creates_data_files() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.sampler.sensor_backend = SensorBackend::None;
    config.notifications.enabled = false;

    let tracker = SleepTracker::open(config.clone(), dir.path()).unwrap();
    tracker.login("ana", "uid-ana").await.unwrap();
    tracker.shutdown();
    drop(tracker);

    assert!(dir.path().join("sleepwell.db").exists());
    assert!(dir.path().join("device.key").exists());
    assert!(dir.path().join("dayTimes.json").exists());

    // the same directory reopens with the stored credentials readable
    let reopened = SleepTracker::open(config, dir.path()).unwrap();
    assert_eq!(reopened.username().unwrap().as_deref(), Some("ana"));
    assert_eq!(reopened.windows().unwrap().len(), 7);
}

/// A tracker over the files in `dir`, the way each CLI invocation opens one.
fn tracker_in(dir: &TempDir, now: NaiveDateTime) -> SleepTracker {
    SleepTracker::builder(
        SleepDb::open_at(&dir.path().join("sleepwell.db")).unwrap(),
        CryptoManager::with_key([9u8; 32]),
        Arc::new(FileMirror::new(dir.path().join("dayTimes.json"))),
    )
    .sensors(Arc::new(ScriptedSensors::new(Vec::new())))
    .notifier(Arc::new(RecordingNotifier::new()))
    .clock(fixed_clock(now))
    .build()
}

#[tokio::test(start_paused = true)]
async fn test_daemon_follows_edits_from_another_process() {
    let dir = TempDir::new().unwrap();
    let monday_sleep = boundary_key(Weekday::Mon, BoundaryKind::Sleep);

    let daemon = tracker_in(&dir, monday(23, 0));
    daemon.login("ana", "uid-ana").await.unwrap();
    daemon.watch_store(Duration::from_secs(5)).unwrap();
    assert_eq!(daemon.sampler().status(), SamplerStatus::Running);

    // a one-shot command disables Monday night while it is in progress
    let cli = tracker_in(&dir, monday(23, 0));
    assert!(!cli.is_armed());
    let mut monday_window = cli.window_for_day(Weekday::Mon).unwrap();
    monday_window.enabled = false;
    let change = cli.update_window(monday_window.clone()).await.unwrap();
    assert_eq!(change.sampler, SamplerAction::Stop);
    assert_eq!(cli.sampler().status(), SamplerStatus::Idle);
    assert!(cli.notifications().pending().is_empty());

    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;
    assert_eq!(daemon.sampler().status(), SamplerStatus::Idle);
    assert!(!daemon.notifications().pending().contains(&monday_sleep));
    assert!(!daemon.view().windows()[0].enabled);

    // and turns it back on
    monday_window.enabled = true;
    let change = cli.update_window(monday_window).await.unwrap();
    assert_eq!(change.sampler, SamplerAction::Start);

    tokio::time::sleep(Duration::from_secs(6)).await;
    settle().await;
    assert_eq!(daemon.sampler().status(), SamplerStatus::Running);
    assert!(daemon.notifications().pending().contains(&monday_sleep));
    assert_eq!(daemon.notifications().pending().len(), 14);

    cli.shutdown();
    daemon.shutdown();
}
