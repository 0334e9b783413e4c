//! Failure reporting.

use serde::Serialize;
use tracing::warn;

/// Category of a reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The credential validator refused the request.
    CredentialValidation,
    /// Group synchronization failed and was rolled back.
    GroupSync,
    /// A logout step failed; the session was invalidated anyway.
    Logout,
}

/// A failure the bridge absorbed into an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Principal involved, when one was asserted.
    pub principal: Option<String>,
    /// Failure category.
    pub kind: FailureKind,
    /// Human readable cause.
    pub message: String,
}

impl FailureRecord {
    /// Creates a record.
    pub fn new(principal: Option<&str>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            principal: principal.map(str::to_string),
            kind,
            message: message.into(),
        }
    }
}

/// Sink for failure records (audit trail, metrics, the log).
pub trait FailureReporter: Send + Sync {
    /// Records a failure. Must not fail.
    fn report(&self, record: &FailureRecord);
}

/// Writes failure records to the `tracing` log at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFailureReporter;

impl FailureReporter for LogFailureReporter {
    fn report(&self, record: &FailureRecord) {
        warn!(
            principal = record.principal.as_deref().unwrap_or("-"),
            kind = ?record.kind,
            error = %record.message,
            "Authentication failure"
        );
    }
}
