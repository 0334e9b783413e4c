//! Per-client session state.

use liaison_storage::UserId;

use crate::identity::SecurityContext;
use crate::outcome::AuthenticationOutcome;
use crate::sync::SyncReport;

/// A client session as seen by the bridge.
///
/// The session holds the bound user id, never the user record itself, and
/// the platform security context the host attached to the transport.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    user_id: Option<UserId>,
    security_context: Option<SecurityContext>,
    groups_synchronized: bool,
    invalidated: bool,
}

impl Session {
    /// Creates an unbound session.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            security_context: None,
            groups_synchronized: false,
            invalidated: false,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Bound user, if any.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Platform security context attached to the session.
    pub fn security_context(&self) -> Option<&SecurityContext> {
        self.security_context.as_ref()
    }

    /// Attaches (or replaces) the platform security context.
    ///
    /// A new context means memberships must be synchronized again.
    pub fn attach_security_context(&mut self, context: SecurityContext) {
        self.security_context = Some(context);
        self.groups_synchronized = false;
    }

    /// Whether the session is bound to a user.
    pub fn is_established(&self) -> bool {
        self.user_id.is_some() && !self.invalidated
    }

    /// Binds the session to the outcome.
    ///
    /// `Authenticated` binds the user; any other outcome leaves the session
    /// without an identity.
    pub fn bind(&mut self, outcome: &AuthenticationOutcome) {
        match outcome.user() {
            Some(user) if !self.invalidated => {
                if self.user_id != Some(user.id) {
                    self.groups_synchronized = false;
                }
                self.user_id = Some(user.id);
            },
            _ => self.clear_identity(),
        }
    }

    /// Removes the bound identity, keeping the session itself.
    pub fn clear_identity(&mut self) {
        self.user_id = None;
        self.groups_synchronized = false;
    }

    /// Ends the session.
    pub fn invalidate(&mut self) {
        self.clear_identity();
        self.security_context = None;
        self.invalidated = true;
    }

    /// Whether [`Session::invalidate`] was called.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Whether memberships were synchronized from the current security context.
    pub fn groups_synchronized(&self) -> bool {
        self.groups_synchronized
    }

    pub(crate) fn mark_groups_synchronized(&mut self) {
        self.groups_synchronized = true;
    }
}

/// Result of [`crate::AuthenticationBridge::refresh_session_groups`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupRefresh {
    /// Memberships were re-synchronized from the session's security context.
    Synchronized(SyncReport),
    /// Already done for this session and context.
    AlreadySynchronized,
    /// The session has no bound user or no security context.
    NotApplicable,
    /// Synchronization failed; the session identity was cleared.
    Failed,
}
