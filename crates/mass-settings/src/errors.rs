//! Errors raised while loading client settings.

use thiserror::Error;

/// Why the client settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The client settings file exists but could not be read.
    #[error("failed to read client settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The client settings file is not valid JSON, or does not fit [`crate::ClientSettings`].
    #[error("malformed client settings file: {0}")]
    Json(#[from] serde_json::Error),
    /// A client setting is outside its accepted range.
    #[error("invalid client setting: {0}")]
    InvalidValue(String),
}

/// Result of a settings load.
pub type Result<T> = std::result::Result<T, SettingsError>;
