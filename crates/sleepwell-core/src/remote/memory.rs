//! In-process mirror.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use super::{RemoteMirror, RemoteScheduleWindow};
use crate::error::RemoteError;

/// Mirror kept in memory. Can be switched offline to exercise failure paths.
#[derive(Default)]
pub struct MemoryMirror {
    docs: Mutex<BTreeMap<String, RemoteScheduleWindow>>,
    next_id: AtomicU64,
    offline: AtomicBool,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a network-style error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// All documents regardless of owner.
    pub fn documents(&self) -> Vec<RemoteScheduleWindow> {
        self.lock()
            .iter()
            .map(|(id, doc)| RemoteScheduleWindow {
                document_id: id.clone(),
                ..doc.clone()
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, RemoteScheduleWindow>> {
        self.docs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                status: 503,
                message: "mirror offline".into(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteMirror for MemoryMirror {
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<RemoteScheduleWindow>, RemoteError> {
        self.check_online()?;
        Ok(self
            .documents()
            .into_iter()
            .filter(|doc| doc.user_id == user_id)
            .collect())
    }

    async fn create(&self, window: &RemoteScheduleWindow) -> Result<String, RemoteError> {
        self.check_online()?;
        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut doc = window.clone();
        doc.document_id.clear();
        self.lock().insert(id.clone(), doc);
        Ok(id)
    }

    async fn update(
        &self,
        document_id: &str,
        window: &RemoteScheduleWindow,
    ) -> Result<(), RemoteError> {
        self.check_online()?;
        let mut docs = self.lock();
        let slot = docs
            .get_mut(document_id)
            .ok_or_else(|| RemoteError::NotFound(document_id.to_string()))?;
        *slot = RemoteScheduleWindow {
            document_id: String::new(),
            ..window.clone()
        };
        Ok(())
    }

    async fn delete(&self, document_id: &str) -> Result<(), RemoteError> {
        self.check_online()?;
        self.lock()
            .remove(document_id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(document_id.to_string()))
    }
}
