//! Preference encryption with a device-held key.
//!
//! Stored value format: `<base64 iv>:<base64 ciphertext>`.

use std::fs;
use std::io::Write;
use std::path::Path;

use aes_gcm::aead::{rand_core::RngCore, Aead, AeadCore, OsRng};
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use crate::error::CryptoError;

const DEVICE_KEY_FILE: &str = "device.key";
const KEY_LEN: usize = 32;
const IV_LEN: usize = 12;

/// AES-256-GCM wrapper for kv preference values.
pub struct CryptoManager {
    cipher: Aes256Gcm,
}

impl CryptoManager {
    pub fn with_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
        }
    }

    /// Load the device key from `dir`, generating one on first use.
    pub fn load_or_create_at(dir: &Path) -> Result<Self, CryptoError> {
        let key = load_or_create_device_key(dir)?;
        Ok(Self::with_key(key))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptFailed)?;
        Ok(format!("{}:{}", B64.encode(nonce), B64.encode(ciphertext)))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let (iv, ciphertext) = stored.split_once(':').ok_or(CryptoError::Malformed)?;
        let iv = B64.decode(iv)?;
        if iv.len() != IV_LEN {
            return Err(CryptoError::Malformed);
        }
        let ciphertext = B64.decode(ciphertext)?;
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptFailed)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::NotUtf8)
    }
}

fn load_or_create_device_key(dir: &Path) -> Result<[u8; KEY_LEN], CryptoError> {
    let key_path = dir.join(DEVICE_KEY_FILE);

    if key_path.exists() {
        let encoded = fs::read_to_string(&key_path)?;
        let raw = B64.decode(encoded.trim())?;
        let len = raw.len();
        return raw
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(len));
    }

    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);

    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    let mut file = fs::File::create(&key_path)?;
    writeln!(file, "{}", B64.encode(key))?;
    restrict_permissions(&key_path)?;
    tracing::info!(path = %key_path.display(), "generated device key");

    Ok(key)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), CryptoError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), CryptoError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn encrypt_then_decrypt() {
        let crypto = CryptoManager::with_key([7u8; 32]);
        let stored = crypto.encrypt("night-owl").unwrap();
        let (iv, ct) = stored.split_once(':').unwrap();
        assert_eq!(B64.decode(iv).unwrap().len(), IV_LEN);
        assert!(!ct.is_empty());
        assert_eq!(crypto.decrypt(&stored).unwrap(), "night-owl");
    }

    #[test]
    fn each_value_gets_a_fresh_iv() {
        let crypto = CryptoManager::with_key([7u8; 32]);
        assert_ne!(crypto.encrypt("same").unwrap(), crypto.encrypt("same").unwrap());
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let stored = CryptoManager::with_key([1u8; 32]).encrypt("secret").unwrap();
        let other = CryptoManager::with_key([2u8; 32]);
        assert!(matches!(other.decrypt(&stored), Err(CryptoError::DecryptFailed)));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let crypto = CryptoManager::with_key([7u8; 32]);
        assert!(matches!(crypto.decrypt("no-separator"), Err(CryptoError::Malformed)));
        assert!(matches!(crypto.decrypt("!!:??"), Err(CryptoError::Base64(_))));
        assert!(matches!(crypto.decrypt("AAAA:AAAA"), Err(CryptoError::Malformed)));
    }

    #[test]
    fn device_key_persists() {
        let dir = TempDir::new().unwrap();
        let stored = CryptoManager::load_or_create_at(dir.path())
            .unwrap()
            .encrypt("kept")
            .unwrap();
        let reopened = CryptoManager::load_or_create_at(dir.path()).unwrap();
        assert_eq!(reopened.decrypt(&stored).unwrap(), "kept");
    }

    #[cfg(unix)]
    #[test]
    fn device_key_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        CryptoManager::load_or_create_at(dir.path()).unwrap();
        let mode = fs::metadata(dir.path().join(DEVICE_KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn short_device_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DEVICE_KEY_FILE), B64.encode([1u8; 8])).unwrap();
        assert!(matches!(
            CryptoManager::load_or_create_at(dir.path()),
            Err(CryptoError::InvalidKeyLength(8))
        ));
    }
}
