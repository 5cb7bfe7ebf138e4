//! Remote mirror of the weekly windows.
//!
//! The mirror is one document collection filtered by owning user. It holds
//! copies of local windows and never owns them: the local store assigns ids,
//! the mirror only assigns document ids.

mod file;
mod firestore;
mod memory;

pub use file::FileMirror;
pub use firestore::FirestoreMirror;
pub use memory::MemoryMirror;

use std::sync::Arc;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::schedule::{day_serde, time_serde, ScheduleWindow};
use crate::storage::{RemoteBackend, RemoteConfig};

/// Remote projection of a [`ScheduleWindow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteScheduleWindow {
    pub user_id: String,
    /// Local window id.
    pub id: i64,
    #[serde(with = "day_serde")]
    pub start_day: Weekday,
    #[serde(with = "day_serde")]
    pub end_day: Weekday,
    #[serde(with = "time_serde")]
    pub sleep_time: NaiveTime,
    #[serde(rename = "wakeUpTime", with = "time_serde")]
    pub wake_time: NaiveTime,
    pub enabled: bool,
    /// Assigned by the mirror; not part of the stored document body.
    #[serde(skip)]
    pub document_id: String,
}

pub fn to_remote(window: &ScheduleWindow, user_id: &str) -> RemoteScheduleWindow {
    RemoteScheduleWindow {
        user_id: user_id.to_string(),
        id: window.id,
        start_day: window.start_day,
        end_day: window.end_day,
        sleep_time: window.sleep_time,
        wake_time: window.wake_time,
        enabled: window.enabled,
        document_id: String::new(),
    }
}

pub fn to_local(remote: &RemoteScheduleWindow) -> ScheduleWindow {
    ScheduleWindow {
        id: remote.id,
        start_day: remote.start_day,
        end_day: remote.end_day,
        sleep_time: remote.sleep_time,
        wake_time: remote.wake_time,
        enabled: remote.enabled,
    }
}

/// Cloud document collection holding users' windows.
///
/// Calls carry no timeout and are never retried here.
#[async_trait::async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Every document owned by `user_id`, with `document_id` filled in.
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<RemoteScheduleWindow>, RemoteError>;

    /// Store a new document and return its id.
    async fn create(&self, window: &RemoteScheduleWindow) -> Result<String, RemoteError>;

    /// Overwrite the document `document_id`.
    async fn update(
        &self,
        document_id: &str,
        window: &RemoteScheduleWindow,
    ) -> Result<(), RemoteError>;

    async fn delete(&self, document_id: &str) -> Result<(), RemoteError>;
}

/// Build the mirror selected in config.
pub fn from_config(
    config: &RemoteConfig,
    data_dir: &std::path::Path,
) -> Result<Arc<dyn RemoteMirror>, RemoteError> {
    match config.backend {
        RemoteBackend::File => Ok(Arc::new(FileMirror::new(
            data_dir.join(format!("{}.json", config.collection)),
        ))),
        RemoteBackend::Firestore => Ok(Arc::new(FirestoreMirror::from_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{parse_time, WEEK};
    use proptest::prelude::*;

    fn window() -> ScheduleWindow {
        ScheduleWindow {
            id: 4,
            start_day: Weekday::Thu,
            end_day: Weekday::Fri,
            sleep_time: parse_time("23:15").unwrap(),
            wake_time: parse_time("06:45").unwrap(),
            enabled: false,
        }
    }

    #[test]
    fn projection_carries_owner() {
        let remote = to_remote(&window(), "uid-7");
        assert_eq!(remote.user_id, "uid-7");
        assert_eq!(remote.id, 4);
        assert!(remote.document_id.is_empty());
        assert_eq!(to_local(&remote), window());
    }

    #[test]
    fn document_body_uses_camel_case_fields() {
        let mut remote = to_remote(&window(), "uid-7");
        remote.document_id = "doc".into();
        let json = serde_json::to_value(&remote).unwrap();
        assert_eq!(json["userId"], "uid-7");
        assert_eq!(json["startDay"], "THURSDAY");
        assert_eq!(json["wakeUpTime"], "06:45");
        assert!(json.get("documentId").is_none());
    }

    proptest! {
        #[test]
        fn round_trip_preserves_every_local_field(
            id in 1i64..10_000,
            start in 0usize..7,
            end in 0usize..7,
            sleep_min in 0u32..1440,
            wake_min in 0u32..1440,
            enabled: bool,
            user in "[a-zA-Z0-9]{1,24}",
        ) {
            let original = ScheduleWindow {
                id,
                start_day: WEEK[start],
                end_day: WEEK[end],
                sleep_time: NaiveTime::from_hms_opt(sleep_min / 60, sleep_min % 60, 0).unwrap(),
                wake_time: NaiveTime::from_hms_opt(wake_min / 60, wake_min % 60, 0).unwrap(),
                enabled,
            };
            let remote = to_remote(&original, &user);
            prop_assert_eq!(&remote.user_id, &user);
            prop_assert_eq!(to_local(&remote), original);
        }
    }
}
