//! Core types for window synchronization.

use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::storage::SleepDb;

const SYNC_STATE_KEY: &str = "sync.state";

/// Where the local store stands relative to the mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Never reconciled with the mirror (or both sides were empty).
    #[default]
    Unsynced,
    /// Local windows were pushed to an empty mirror.
    Seeded,
    /// Local windows were replaced by the mirror's copy.
    Mirrored,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Unsynced => "unsynced",
            SyncState::Seeded => "seeded",
            SyncState::Mirrored => "mirrored",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "unsynced" => Some(SyncState::Unsynced),
            "seeded" => Some(SyncState::Seeded),
            "mirrored" => Some(SyncState::Mirrored),
            _ => None,
        }
    }

    /// Whether single-record pushes should reach the mirror.
    pub fn is_synced(&self) -> bool {
        !matches!(self, SyncState::Unsynced)
    }

    pub fn load(db: &SleepDb) -> Result<Self, DatabaseError> {
        Ok(db
            .kv_get(SYNC_STATE_KEY)?
            .and_then(|raw| Self::parse(&raw))
            .unwrap_or_default())
    }

    pub fn store(self, db: &SleepDb) -> Result<(), DatabaseError> {
        db.kv_set(SYNC_STATE_KEY, self.as_str())
    }
}

/// Result of the post-login reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Mirror was empty; `pushed` local windows were created remotely.
    Seeded { pushed: usize },
    /// Mirror was authoritative; local store now holds `windows` records.
    Mirrored { windows: usize },
    /// Both sides were empty.
    NothingToSync,
    /// The mirror could not be read; local state is untouched.
    ///
    /// Kept apart from an empty mirror on purpose: seeding after a failed
    /// fetch would duplicate documents that already exist remotely.
    RemoteUnavailable,
}

/// Result of mirroring one local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    Mirrored,
    /// No remote counterpart is known, or the store was never synced.
    Skipped,
    /// The remote call failed and was logged.
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_defaults_to_unsynced_and_persists() {
        let db = SleepDb::open_memory().unwrap();
        assert_eq!(SyncState::load(&db).unwrap(), SyncState::Unsynced);
        SyncState::Mirrored.store(&db).unwrap();
        assert_eq!(SyncState::load(&db).unwrap(), SyncState::Mirrored);
        assert!(SyncState::Mirrored.is_synced());
        assert!(!SyncState::Unsynced.is_synced());
    }

    #[test]
    fn unknown_stored_state_reads_as_unsynced() {
        let db = SleepDb::open_memory().unwrap();
        db.kv_set(SYNC_STATE_KEY, "bogus").unwrap();
        assert_eq!(SyncState::load(&db).unwrap(), SyncState::Unsynced);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(SyncOutcome::Seeded { pushed: 7 }).unwrap();
        assert_eq!(json["outcome"], "seeded");
        assert_eq!(json["pushed"], 7);
    }
}
