//! JSON-file document collection.
//!
//! The whole collection is one JSON object mapping document id to document
//! body. It is the default backend when no cloud project is configured.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use uuid::Uuid;

use super::{RemoteMirror, RemoteScheduleWindow};
use crate::error::RemoteError;

type Collection = BTreeMap<String, RemoteScheduleWindow>;

pub struct FileMirror {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    guard: Mutex<()>,
}

impl FileMirror {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn load(&self) -> Result<Collection, RemoteError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Collection::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Collection::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, docs: &Collection) -> Result<(), RemoteError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(docs)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn modify<T>(
        &self,
        f: impl FnOnce(&mut Collection) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let _held = self.guard.lock().unwrap_or_else(|p| p.into_inner());
        let mut docs = self.load()?;
        let out = f(&mut docs)?;
        self.store(&docs)?;
        Ok(out)
    }
}

#[async_trait::async_trait]
impl RemoteMirror for FileMirror {
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<RemoteScheduleWindow>, RemoteError> {
        let _held = self.guard.lock().unwrap_or_else(|p| p.into_inner());
        Ok(self
            .load()?
            .into_iter()
            .filter(|(_, doc)| doc.user_id == user_id)
            .map(|(id, doc)| RemoteScheduleWindow {
                document_id: id,
                ..doc
            })
            .collect())
    }

    async fn create(&self, window: &RemoteScheduleWindow) -> Result<String, RemoteError> {
        self.modify(|docs| {
            let id = Uuid::new_v4().simple().to_string();
            docs.insert(id.clone(), window.clone());
            Ok(id)
        })
    }

    async fn update(
        &self,
        document_id: &str,
        window: &RemoteScheduleWindow,
    ) -> Result<(), RemoteError> {
        self.modify(|docs| match docs.get_mut(document_id) {
            Some(slot) => {
                *slot = window.clone();
                Ok(())
            }
            None => Err(RemoteError::NotFound(document_id.to_string())),
        })
    }

    async fn delete(&self, document_id: &str) -> Result<(), RemoteError> {
        self.modify(|docs| {
            docs.remove(document_id)
                .map(|_| ())
                .ok_or_else(|| RemoteError::NotFound(document_id.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::to_remote;
    use crate::schedule::{default_week, parse_time};
    use tempfile::TempDir;

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dayTimes.json");
        let week = default_week(parse_time("22:00").unwrap(), parse_time("07:00").unwrap());

        let doc_id = {
            let mirror = FileMirror::new(path.clone());
            assert!(mirror.fetch_all("alice").await.unwrap().is_empty());
            mirror.create(&to_remote(&week[3], "alice")).await.unwrap()
        };

        let mirror = FileMirror::new(path);
        let docs = mirror.fetch_all("alice").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document_id, doc_id);
        assert_eq!(docs[0].start_day, week[3].start_day);
        assert!(mirror.fetch_all("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mirror = FileMirror::new(dir.path().join("dayTimes.json"));
        let week = default_week(parse_time("22:00").unwrap(), parse_time("07:00").unwrap());
        assert!(matches!(
            mirror.update("nope", &to_remote(&week[0], "alice")).await,
            Err(RemoteError::NotFound(_))
        ));
        assert!(matches!(mirror.delete("nope").await, Err(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dayTimes.json");
        fs::write(&path, "{not json").unwrap();
        let mirror = FileMirror::new(path);
        assert!(matches!(
            mirror.fetch_all("alice").await,
            Err(RemoteError::Serialization(_))
        ));
    }
}
