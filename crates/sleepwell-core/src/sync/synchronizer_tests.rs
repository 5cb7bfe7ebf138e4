//! Tests for the synchronizer against the in-memory mirror.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::super::synchronizer::*;
    use crate::remote::{to_remote, MemoryMirror, RemoteMirror};
    use crate::schedule::{default_week, parse_time, ScheduleWindow};
    use crate::storage::{lock, SleepDb};
    use crate::sync::types::{PushOutcome, SyncOutcome, SyncState};

    const USER: &str = "uid-1";

    fn setup() -> (Arc<MemoryMirror>, Synchronizer, Mutex<SleepDb>) {
        let mirror = Arc::new(MemoryMirror::new());
        let sync = Synchronizer::new(mirror.clone());
        let db = Mutex::new(SleepDb::open_memory().unwrap());
        (mirror, sync, db)
    }

    fn week() -> Vec<ScheduleWindow> {
        default_week(parse_time("22:00").unwrap(), parse_time("07:00").unwrap())
    }

    fn seed_local(db: &Mutex<SleepDb>) -> Vec<ScheduleWindow> {
        let db = lock(db);
        week()
            .iter()
            .map(|w| db.insert_window(w).unwrap().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn empty_remote_is_seeded_from_local() {
        let (mirror, sync, db) = setup();
        let local = seed_local(&db);

        let outcome = sync.sync_after_login(&db, USER).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Seeded { pushed: 7 });
        assert_eq!(sync.state(&db).unwrap(), SyncState::Seeded);

        let docs = mirror.fetch_all(USER).await.unwrap();
        assert_eq!(docs.len(), 7);
        let links = lock(&db).remote_links().unwrap();
        for window in &local {
            let doc = docs.iter().find(|d| d.id == window.id).unwrap();
            assert_eq!(links.get(&window.id), Some(&doc.document_id));
        }
    }

    #[tokio::test]
    async fn non_empty_remote_replaces_local() {
        let (mirror, sync, db) = setup();
        seed_local(&db);

        let mut remote_monday = week()[0].clone();
        remote_monday.id = 42;
        remote_monday.sleep_time = parse_time("23:45").unwrap();
        mirror.create(&to_remote(&remote_monday, USER)).await.unwrap();
        // another user's document is ignored
        mirror.create(&to_remote(&week()[1], "someone-else")).await.unwrap();

        let outcome = sync.sync_after_login(&db, USER).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Mirrored { windows: 1 });
        assert_eq!(lock(&db).list_windows().unwrap(), vec![remote_monday]);
        assert!(lock(&db).remote_link(42).unwrap().is_some());
        assert_eq!(sync.state(&db).unwrap(), SyncState::Mirrored);
    }

    #[tokio::test]
    async fn both_empty_stays_unsynced() {
        let (mirror, sync, db) = setup();
        let outcome = sync.sync_after_login(&db, USER).await.unwrap();
        assert_eq!(outcome, SyncOutcome::NothingToSync);
        assert_eq!(sync.state(&db).unwrap(), SyncState::Unsynced);
        assert!(mirror.documents().is_empty());
    }

    #[tokio::test]
    async fn unreachable_remote_leaves_local_untouched() {
        let (mirror, sync, db) = setup();
        let local = seed_local(&db);
        mirror.set_offline(true);

        let outcome = sync.sync_after_login(&db, USER).await.unwrap();
        assert_eq!(outcome, SyncOutcome::RemoteUnavailable);
        assert_eq!(lock(&db).list_windows().unwrap(), local);
        assert_eq!(sync.state(&db).unwrap(), SyncState::Unsynced);

        mirror.set_offline(false);
        assert!(mirror.documents().is_empty());
    }

    #[tokio::test]
    async fn second_sync_leaves_local_set_unchanged() {
        let (_mirror, sync, db) = setup();
        seed_local(&db);

        sync.sync_after_login(&db, USER).await.unwrap();
        let after_first = lock(&db).list_windows().unwrap();
        let links_first = lock(&db).remote_links().unwrap();

        let outcome = sync.sync_after_login(&db, USER).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Mirrored { windows: 7 });
        assert_eq!(lock(&db).list_windows().unwrap(), after_first);
        assert_eq!(lock(&db).remote_links().unwrap(), links_first);
    }

    #[tokio::test]
    async fn update_is_mirrored_by_recorded_document() {
        let (mirror, sync, db) = setup();
        let local = seed_local(&db);
        sync.sync_after_login(&db, USER).await.unwrap();

        let mut edited = local[2].clone();
        edited.enabled = false;
        lock(&db).update_window(&edited).unwrap();
        let outcome = sync.push_updated(&db, USER, &edited).await.unwrap();
        assert_eq!(outcome, PushOutcome::Mirrored);

        let docs = mirror.fetch_all(USER).await.unwrap();
        let doc = docs.iter().find(|d| d.id == edited.id).unwrap();
        assert!(!doc.enabled);
    }

    #[tokio::test]
    async fn missing_link_is_skipped() {
        let (mirror, sync, db) = setup();
        let local = seed_local(&db);
        sync.sync_after_login(&db, USER).await.unwrap();
        lock(&db).remove_remote_link(local[0].id).unwrap();

        let outcome = sync.push_updated(&db, USER, &local[0]).await.unwrap();
        assert_eq!(outcome, PushOutcome::Skipped);
        let outcome = sync.push_deleted(&db, local[0].id, None).await.unwrap();
        assert_eq!(outcome, PushOutcome::Skipped);
        assert_eq!(mirror.documents().len(), 7);
    }

    #[tokio::test]
    async fn remote_failures_are_swallowed() {
        let (mirror, sync, db) = setup();
        let local = seed_local(&db);
        sync.sync_after_login(&db, USER).await.unwrap();
        mirror.set_offline(true);

        let outcome = sync.push_updated(&db, USER, &local[1]).await.unwrap();
        assert_eq!(outcome, PushOutcome::Failed);
        let created = sync.push_created(&db, USER, &local[1]).await.unwrap();
        assert_eq!(created, PushOutcome::Failed);
        assert_eq!(sync.delete_remote(USER).await, 0);
    }

    #[tokio::test]
    async fn pushes_wait_for_first_sync() {
        let (mirror, sync, db) = setup();
        let local = seed_local(&db);
        let outcome = sync.push_created(&db, USER, &local[0]).await.unwrap();
        assert_eq!(outcome, PushOutcome::Skipped);
        assert!(mirror.documents().is_empty());
    }

    #[tokio::test]
    async fn delete_and_create_round_trip() {
        let (mirror, sync, db) = setup();
        let local = seed_local(&db);
        sync.sync_after_login(&db, USER).await.unwrap();

        let link = lock(&db).remote_link(local[6].id).unwrap();
        lock(&db).delete_window(local[6].id).unwrap();
        let outcome = sync
            .push_deleted(&db, local[6].id, link.as_deref())
            .await
            .unwrap();
        assert_eq!(outcome, PushOutcome::Mirrored);
        assert_eq!(mirror.documents().len(), 6);

        let restored = lock(&db).insert_window(&week()[6]).unwrap().unwrap();
        let outcome = sync.push_created(&db, USER, &restored).await.unwrap();
        assert_eq!(outcome, PushOutcome::Mirrored);
        assert!(lock(&db).remote_link(restored.id).unwrap().is_some());
        assert_eq!(mirror.documents().len(), 7);
    }

    #[tokio::test]
    async fn delete_remote_and_forget() {
        let (mirror, sync, db) = setup();
        seed_local(&db);
        sync.sync_after_login(&db, USER).await.unwrap();

        assert_eq!(sync.delete_remote(USER).await, 7);
        assert!(mirror.documents().is_empty());

        sync.forget(&db).unwrap();
        assert!(lock(&db).remote_links().unwrap().is_empty());
        assert_eq!(sync.state(&db).unwrap(), SyncState::Unsynced);
    }
}
