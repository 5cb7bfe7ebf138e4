//! Core error types for sleepwell-core.
//!
//! Local-store failures propagate to the caller. Remote failures are caught
//! by the synchronizer and only logged, so [`RemoteError`] rarely escapes.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sleepwell-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Remote mirror errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Preference encryption errors
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Sensor errors
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be decoded
    #[error("Corrupt value in column '{column}': {value}")]
    CorruptValue { column: String, value: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
///
/// These are user-recoverable: the caller shows the message next to the
/// offending field and asks for new input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was left blank
    #[error("email and password can not be empty")]
    EmptyCredentials { fields: Vec<String> },

    /// Signup confirmation does not match
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// No window exists for the requested day
    #[error("No sleep window for {0}")]
    UnknownWindow(String),

    /// Operation requires a logged-in user
    #[error("Not logged in")]
    NotLoggedIn,
}

impl ValidationError {
    /// Field names the error refers to, for field-level display.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ValidationError::EmptyCredentials { fields } => {
                fields.iter().map(String::as_str).collect()
            }
            ValidationError::PasswordMismatch => vec!["confirm_password"],
            ValidationError::InvalidValue { field, .. } => vec![field.as_str()],
            ValidationError::UnknownWindow(_) | ValidationError::NotLoggedIn => Vec::new(),
        }
    }
}

/// Remote mirror errors.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed remote document: {0}")]
    Malformed(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Remote backend not configured: {0}")]
    NotConfigured(String),
}

/// Preference encryption errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid device key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Malformed encrypted value")]
    Malformed,

    #[error("Base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Encryption failed")]
    EncryptFailed,

    #[error("Decryption failed (wrong key or tampered value)")]
    DecryptFailed,

    #[error("Decrypted value is not UTF-8")]
    NotUtf8,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sensor errors.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("No sensors available at {0}")]
    Unavailable(String),

    #[error("Sensor already registered")]
    AlreadyRegistered,

    #[error("Failed to read sensor {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
