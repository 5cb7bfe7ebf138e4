//! Encrypted user preferences.
//!
//! Three entries live in the local `kv` table, each encrypted with the
//! device key: `username`, `user_id` and `dark_mode`. They are written at
//! login and removed at logout or data wipe.

mod crypto;

pub use crypto::CryptoManager;

use crate::error::CoreError;
use crate::storage::SleepDb;

const KEY_USERNAME: &str = "pref.username";
const KEY_USER_ID: &str = "pref.user_id";
const KEY_DARK_MODE: &str = "pref.dark_mode";

/// Encrypted preference accessor over [`SleepDb`]'s kv store.
pub struct UserPreferences {
    crypto: CryptoManager,
}

impl UserPreferences {
    pub fn new(crypto: CryptoManager) -> Self {
        Self { crypto }
    }

    fn read(&self, db: &SleepDb, key: &str) -> Result<Option<String>, CoreError> {
        let Some(stored) = db.kv_get(key)? else {
            return Ok(None);
        };
        match self.crypto.decrypt(&stored) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // A value written under another device key is unreadable; treat it as unset.
                tracing::warn!(key, error = %e, "discarding unreadable preference");
                Ok(None)
            }
        }
    }

    fn write(&self, db: &SleepDb, key: &str, value: &str) -> Result<(), CoreError> {
        let stored = self.crypto.encrypt(value)?;
        db.kv_set(key, &stored)?;
        Ok(())
    }

    pub fn save_credentials(
        &self,
        db: &SleepDb,
        username: &str,
        user_id: &str,
    ) -> Result<(), CoreError> {
        self.write(db, KEY_USERNAME, username)?;
        self.write(db, KEY_USER_ID, user_id)
    }

    /// Forget the logged-in user. Display preferences survive.
    pub fn clear_credentials(&self, db: &SleepDb) -> Result<(), CoreError> {
        db.kv_delete(KEY_USERNAME)?;
        db.kv_delete(KEY_USER_ID)?;
        Ok(())
    }

    /// Forget everything this module stores.
    pub fn clear_all(&self, db: &SleepDb) -> Result<(), CoreError> {
        self.clear_credentials(db)?;
        db.kv_delete(KEY_DARK_MODE)?;
        Ok(())
    }

    pub fn username(&self, db: &SleepDb) -> Result<Option<String>, CoreError> {
        self.read(db, KEY_USERNAME)
    }

    pub fn user_id(&self, db: &SleepDb) -> Result<Option<String>, CoreError> {
        self.read(db, KEY_USER_ID)
    }

    pub fn is_logged_in(&self, db: &SleepDb) -> Result<bool, CoreError> {
        Ok(self.user_id(db)?.is_some_and(|id| !id.is_empty()))
    }

    pub fn dark_mode(&self, db: &SleepDb) -> Result<bool, CoreError> {
        Ok(self.read(db, KEY_DARK_MODE)?.as_deref() == Some("true"))
    }

    pub fn set_dark_mode(&self, db: &SleepDb, enabled: bool) -> Result<(), CoreError> {
        self.write(db, KEY_DARK_MODE, if enabled { "true" } else { "false" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs() -> UserPreferences {
        UserPreferences::new(CryptoManager::with_key([9u8; 32]))
    }

    #[test]
    fn credentials_lifecycle() {
        let db = SleepDb::open_memory().unwrap();
        let prefs = prefs();
        assert!(!prefs.is_logged_in(&db).unwrap());

        prefs.save_credentials(&db, "ada", "uid-1").unwrap();
        assert!(prefs.is_logged_in(&db).unwrap());
        assert_eq!(prefs.username(&db).unwrap().as_deref(), Some("ada"));
        assert_eq!(prefs.user_id(&db).unwrap().as_deref(), Some("uid-1"));

        prefs.set_dark_mode(&db, true).unwrap();
        prefs.clear_credentials(&db).unwrap();
        assert!(!prefs.is_logged_in(&db).unwrap());
        assert!(prefs.dark_mode(&db).unwrap());
    }

    #[test]
    fn values_are_not_stored_in_plaintext() {
        let db = SleepDb::open_memory().unwrap();
        prefs().save_credentials(&db, "ada", "uid-1").unwrap();
        let raw = db.kv_get(KEY_USERNAME).unwrap().unwrap();
        assert!(!raw.contains("ada"));
        assert_eq!(raw.split(':').count(), 2);
    }

    #[test]
    fn dark_mode_defaults_off_and_clear_all_resets() {
        let db = SleepDb::open_memory().unwrap();
        let prefs = prefs();
        assert!(!prefs.dark_mode(&db).unwrap());
        prefs.set_dark_mode(&db, true).unwrap();
        prefs.save_credentials(&db, "ada", "uid-1").unwrap();

        prefs.clear_all(&db).unwrap();
        assert!(!prefs.dark_mode(&db).unwrap());
        assert!(prefs.username(&db).unwrap().is_none());
    }

    #[test]
    fn values_from_another_key_read_as_unset() {
        let db = SleepDb::open_memory().unwrap();
        prefs().save_credentials(&db, "ada", "uid-1").unwrap();
        let other = UserPreferences::new(CryptoManager::with_key([1u8; 32]));
        assert!(other.user_id(&db).unwrap().is_none());
        assert!(!other.is_logged_in(&db).unwrap());
    }
}
