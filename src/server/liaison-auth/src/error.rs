//! Authentication error types.

use thiserror::Error;

use liaison_storage::{StorageError, UserId};

/// Errors raised by credential validation and the surrounding bridge plumbing.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (rejected principal, bad token, etc.).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No principal was asserted and no default identity applies.
    #[error("missing principal")]
    MissingPrincipal,

    /// The principal has no local user and auto-creation is disabled.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// Authentication method not enabled.
    #[error("auth method not enabled: {0}")]
    MethodNotEnabled(String),

    /// A host hook refused or failed.
    #[error("hook failed: {0}")]
    Hook(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        AuthError::Storage(e.to_string())
    }
}

/// Errors raised while synchronizing group memberships.
///
/// Any of these means the unit of work was rolled back.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The user disappeared before the memberships could be written.
    #[error("user not found: {0}")]
    UnknownUser(UserId),

    /// Storage error during resolution or commit.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for SyncError {
    fn from(e: StorageError) -> Self {
        SyncError::Storage(e.to_string())
    }
}
