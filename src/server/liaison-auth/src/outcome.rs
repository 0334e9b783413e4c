//! Authentication outcome types.

use serde::{Deserialize, Serialize};

use liaison_storage::LocalUser;

/// Why an authentication attempt ended in [`AuthenticationOutcome::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The credential validator rejected the asserted principal.
    CredentialsRejected,
    /// The principal was accepted but its groups could not be synchronized.
    GroupSyncFailed,
}

/// Result of one pass through the authentication bridge.
///
/// Only `Authenticated` may be bound to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    /// The request maps to a local user with up-to-date memberships.
    Authenticated(LocalUser),
    /// No identity could be established; the request proceeds anonymously.
    Anonymous,
    /// An identity was asserted but could not be accepted.
    Failed(FailureReason),
}

impl AuthenticationOutcome {
    /// Returns the authenticated user, if any.
    pub fn user(&self) -> Option<&LocalUser> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Whether the outcome carries a user.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Short label used in logs and API responses.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Authenticated(_) => "authenticated",
            Self::Anonymous => "anonymous",
            Self::Failed(_) => "failed",
        }
    }
}
