//! Shared application state.

use liaison_auth::{AuthenticationBridge, PreAuthSettings};

use crate::registry::SessionRegistry;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// The authentication bridge.
    pub bridge: AuthenticationBridge,
    /// Live sessions.
    pub sessions: SessionRegistry,
    /// Pre-authentication header settings.
    pub pre_auth: PreAuthSettings,
    /// Exposes the security context endpoint used in development.
    pub dev_mode: bool,
}

impl AppState {
    /// Creates state with an empty session registry.
    pub fn new(bridge: AuthenticationBridge, pre_auth: PreAuthSettings) -> Self {
        Self {
            bridge,
            sessions: SessionRegistry::new(),
            pre_auth,
            dev_mode: false,
        }
    }

    /// Enables or disables development endpoints.
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }
}
