//! Bridge configuration.

use serde::{Deserialize, Serialize};

/// Default request attribute carrying a pre-authenticated principal.
pub const DEFAULT_PREAUTH_HEADER: &str = "REMOTE_USER";

/// Pre-authentication settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreAuthSettings {
    /// Whether an upstream component asserts principals on the request.
    pub enabled: bool,
    /// Header the upstream component writes the principal to.
    pub header_name: String,
}

impl Default for PreAuthSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            header_name: DEFAULT_PREAUTH_HEADER.to_string(),
        }
    }
}

impl PreAuthSettings {
    /// Whether the pre-auth header must be read for this request.
    ///
    /// Requests on an already established session skip it.
    pub fn is_pre_auth_required(&self, session_established: bool) -> bool {
        self.enabled && !session_established
    }
}

/// Settings shared by the bridge and the trusted principal validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Create a local user on first sight of a principal.
    pub auto_create_users: bool,
    /// Lower-case principals before lookup.
    pub login_downcase: bool,
    /// Identity used when a request asserts no principal.
    pub default_principal: Option<String>,
    /// Pre-authentication.
    pub pre_auth: PreAuthSettings,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            auto_create_users: true,
            login_downcase: false,
            default_principal: None,
            pre_auth: PreAuthSettings::default(),
        }
    }
}
