//! Reconciles the local store with the remote mirror.
//!
//! Remote failures never reach the caller: they are logged and the affected
//! step is treated as having no remote data. Local-store failures propagate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::CoreError;
use crate::remote::{to_local, to_remote, RemoteMirror, RemoteScheduleWindow};
use crate::schedule::ScheduleWindow;
use crate::storage::{lock, SleepDb};
use crate::sync::types::{PushOutcome, SyncOutcome, SyncState};

pub struct Synchronizer {
    mirror: Arc<dyn RemoteMirror>,
}

impl Synchronizer {
    pub fn new(mirror: Arc<dyn RemoteMirror>) -> Self {
        Self { mirror }
    }

    pub fn mirror(&self) -> &Arc<dyn RemoteMirror> {
        &self.mirror
    }

    pub fn state(&self, db: &Mutex<SleepDb>) -> Result<SyncState, CoreError> {
        Ok(SyncState::load(&lock(db))?)
    }

    async fn fetch(&self, user_id: &str) -> Option<Vec<RemoteScheduleWindow>> {
        match self.mirror.fetch_all(user_id).await {
            Ok(docs) => Some(docs),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "failed to fetch remote windows");
                None
            }
        }
    }

    /// Post-login reconciliation.
    ///
    /// An empty mirror is seeded from the local store; a non-empty mirror
    /// replaces the local windows. Either way the link table is rebuilt from
    /// a fresh fetch afterwards.
    pub async fn sync_after_login(
        &self,
        db: &Mutex<SleepDb>,
        user_id: &str,
    ) -> Result<SyncOutcome, CoreError> {
        let Some(remote) = self.fetch(user_id).await else {
            return Ok(SyncOutcome::RemoteUnavailable);
        };

        let outcome = if remote.is_empty() {
            let local = lock(db).list_windows()?;
            if local.is_empty() {
                tracing::info!(user_id, "nothing to sync: local and remote are empty");
                return Ok(SyncOutcome::NothingToSync);
            }
            let pushed = self.seed(db, user_id, &local).await?;
            SyncState::Seeded.store(&lock(db))?;
            tracing::info!(user_id, pushed, "seeded remote windows");
            SyncOutcome::Seeded { pushed }
        } else {
            let windows: Vec<ScheduleWindow> = remote.iter().map(to_local).collect();
            lock(db).replace_windows(&windows)?;
            SyncState::Mirrored.store(&lock(db))?;
            tracing::info!(user_id, windows = windows.len(), "replaced local windows from remote");
            SyncOutcome::Mirrored {
                windows: windows.len(),
            }
        };

        self.refresh_links(db, user_id).await?;
        Ok(outcome)
    }

    async fn seed(
        &self,
        db: &Mutex<SleepDb>,
        user_id: &str,
        local: &[ScheduleWindow],
    ) -> Result<usize, CoreError> {
        let mut pushed = 0;
        for window in local {
            match self.mirror.create(&to_remote(window, user_id)).await {
                Ok(document_id) => {
                    lock(db).set_remote_link(window.id, &document_id)?;
                    pushed += 1;
                }
                Err(e) => {
                    tracing::warn!(window_id = window.id, error = %e, "failed to seed remote window");
                }
            }
        }
        Ok(pushed)
    }

    /// Rebuild the local-to-remote id table from the mirror.
    ///
    /// Documents whose local id no longer exists are left unlinked. If the
    /// fetch fails the current table is kept.
    pub async fn refresh_links(&self, db: &Mutex<SleepDb>, user_id: &str) -> Result<(), CoreError> {
        let Some(remote) = self.fetch(user_id).await else {
            return Ok(());
        };
        let local_ids: Vec<i64> = lock(db).list_windows()?.iter().map(|w| w.id).collect();

        let mut links = HashMap::new();
        for doc in remote {
            if local_ids.contains(&doc.id) {
                links.entry(doc.id).or_insert(doc.document_id);
            } else {
                tracing::debug!(document_id = %doc.document_id, id = doc.id, "remote document has no local window");
            }
        }
        lock(db).replace_remote_links(&links)?;
        Ok(())
    }

    fn should_push(&self, db: &Mutex<SleepDb>, what: &str, window_id: i64) -> Result<bool, CoreError> {
        let state = SyncState::load(&lock(db))?;
        if !state.is_synced() {
            tracing::debug!(window_id, what, "store not yet synced; next login reconciles");
        }
        Ok(state.is_synced())
    }

    /// Mirror a newly inserted window.
    pub async fn push_created(
        &self,
        db: &Mutex<SleepDb>,
        user_id: &str,
        window: &ScheduleWindow,
    ) -> Result<PushOutcome, CoreError> {
        if !self.should_push(db, "create", window.id)? {
            return Ok(PushOutcome::Skipped);
        }
        match self.mirror.create(&to_remote(window, user_id)).await {
            Ok(document_id) => {
                lock(db).set_remote_link(window.id, &document_id)?;
                Ok(PushOutcome::Mirrored)
            }
            Err(e) => {
                tracing::warn!(window_id = window.id, error = %e, "failed to create remote window");
                Ok(PushOutcome::Failed)
            }
        }
    }

    /// Mirror an edited window by its recorded document id.
    pub async fn push_updated(
        &self,
        db: &Mutex<SleepDb>,
        user_id: &str,
        window: &ScheduleWindow,
    ) -> Result<PushOutcome, CoreError> {
        if !self.should_push(db, "update", window.id)? {
            return Ok(PushOutcome::Skipped);
        }
        let link = lock(db).remote_link(window.id)?;
        let Some(document_id) = link else {
            tracing::info!(window_id = window.id, "missing remote window; update kept local only");
            return Ok(PushOutcome::Skipped);
        };
        match self.mirror.update(&document_id, &to_remote(window, user_id)).await {
            Ok(()) => Ok(PushOutcome::Mirrored),
            Err(e) => {
                tracing::warn!(window_id = window.id, %document_id, error = %e, "failed to update remote window");
                Ok(PushOutcome::Failed)
            }
        }
    }

    /// Mirror a deletion. `document_id` is the link read before the local
    /// row was removed.
    pub async fn push_deleted(
        &self,
        db: &Mutex<SleepDb>,
        window_id: i64,
        document_id: Option<&str>,
    ) -> Result<PushOutcome, CoreError> {
        if !self.should_push(db, "delete", window_id)? {
            return Ok(PushOutcome::Skipped);
        }
        let Some(document_id) = document_id else {
            tracing::info!(window_id, "missing remote window; delete kept local only");
            return Ok(PushOutcome::Skipped);
        };
        match self.mirror.delete(document_id).await {
            Ok(()) => Ok(PushOutcome::Mirrored),
            Err(e) => {
                tracing::warn!(window_id, document_id, error = %e, "failed to delete remote window");
                Ok(PushOutcome::Failed)
            }
        }
    }

    /// Delete every remote document owned by `user_id`. Returns how many
    /// were removed.
    pub async fn delete_remote(&self, user_id: &str) -> usize {
        let Some(remote) = self.fetch(user_id).await else {
            return 0;
        };
        let mut deleted = 0;
        for doc in remote {
            match self.mirror.delete(&doc.document_id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!(document_id = %doc.document_id, error = %e, "failed to delete remote window");
                }
            }
        }
        deleted
    }

    /// Drop links and sync state, e.g. when the user logs out.
    pub fn forget(&self, db: &Mutex<SleepDb>) -> Result<(), CoreError> {
        let db = lock(db);
        db.replace_remote_links(&HashMap::new())?;
        SyncState::Unsynced.store(&db)?;
        Ok(())
    }
}
