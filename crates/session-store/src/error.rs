//! Error types for the session store

use thiserror::Error;

/// Failure talking to the underlying key-value store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage write failed for {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("Storage read failed for {key}: {reason}")]
    Read { key: String, reason: String },
}

/// Stored data that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid JSON under {key}: {reason}")]
pub struct ParseError {
    pub key: &'static str,
    pub reason: String,
}

/// The identity provider refused or failed to end the session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Identity provider sign-out failed: {0}")]
pub struct ProviderError(pub String);

/// Errors surfaced by session operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    SignOut(#[from] ProviderError),
}
