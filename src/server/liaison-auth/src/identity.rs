//! External identity types and the request capability the bridge reads them from.

use serde::{Deserialize, Serialize};

/// A group membership reported by a platform security context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityGroup {
    /// Fully qualified group name (e.g. `CORP\Admins` or `CN=Admins,DC=corp`).
    pub fqn: String,
    /// Security identifier, when the platform exposes one.
    #[serde(default)]
    pub sid: Option<String>,
}

impl SecurityGroup {
    /// Creates a group entry with no security identifier.
    pub fn new(fqn: impl Into<String>) -> Self {
        Self {
            fqn: fqn.into(),
            sid: None,
        }
    }
}

/// A platform security context attached to the transport session.
///
/// Produced by the single-sign-on layer in front of the application; the
/// bridge only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    /// Identity of the authenticated session, when the platform provides one.
    #[serde(default)]
    pub identity: Option<String>,
    /// Groups the identity belongs to.
    #[serde(default)]
    pub groups: Vec<SecurityGroup>,
}

impl SecurityContext {
    /// Creates a context for the given identity with no groups.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            groups: Vec::new(),
        }
    }

    /// Adds a group by fully qualified name.
    pub fn with_group(mut self, fqn: impl Into<String>) -> Self {
        self.groups.push(SecurityGroup::new(fqn));
        self
    }

    /// Returns the fully qualified group names, in platform order.
    pub fn group_fqns(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.fqn.clone()).collect()
    }
}

/// Where an [`ExternalIdentity`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Principal set on the request by an upstream integration.
    PreAuthenticated,
    /// Platform security context on the transport session.
    SecurityContext,
    /// No external evidence on the request.
    None,
}

/// An externally asserted identity. Built per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// Asserted principal name.
    pub principal_name: Option<String>,
    /// External group identifiers.
    ///
    /// `None` means no group data is available for this request;
    /// `Some(vec![])` means the source reported zero groups.
    pub external_group_ids: Option<Vec<String>>,
    /// Origin of the identity.
    pub source: IdentitySource,
}

impl ExternalIdentity {
    /// An identity with no principal and no group data.
    pub fn absent() -> Self {
        Self {
            principal_name: None,
            external_group_ids: None,
            source: IdentitySource::None,
        }
    }

    /// Returns the principal when it is present and not blank.
    pub fn principal(&self) -> Option<&str> {
        self.principal_name
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }

    /// Whether the source supplied group data (possibly empty).
    pub fn has_group_data(&self) -> bool {
        self.external_group_ids.is_some()
    }
}

/// Request metadata forwarded to the credential validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Transport session identifier, if any.
    pub session_id: Option<String>,
    /// Client address as seen by the host.
    pub remote_addr: Option<String>,
}

/// Capability of an inbound request to carry external authentication evidence.
pub trait CredentialSource {
    /// Principal placed on the request by an upstream component.
    fn preauthenticated_user(&self) -> Option<&str>;

    /// Platform security context attached to the transport session.
    fn security_context(&self) -> Option<&SecurityContext>;

    /// Metadata forwarded to the credential validator.
    fn request_context(&self) -> RequestContext;
}

/// Plain inbound request carrying authentication evidence.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    /// Pre-authenticated principal attribute.
    pub preauthenticated_user: Option<String>,
    /// Security context of the transport session.
    pub security_context: Option<SecurityContext>,
    /// Request metadata.
    pub context: RequestContext,
}

impl AuthRequest {
    /// A request with no external evidence.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A request carrying a pre-authenticated principal.
    pub fn preauthenticated(principal: impl Into<String>) -> Self {
        Self {
            preauthenticated_user: Some(principal.into()),
            ..Self::default()
        }
    }

    /// A request whose session carries a security context.
    pub fn with_security_context(context: SecurityContext) -> Self {
        Self {
            security_context: Some(context),
            ..Self::default()
        }
    }

    /// Sets the client address.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.context.remote_addr = Some(addr.into());
        self
    }
}

impl CredentialSource for AuthRequest {
    fn preauthenticated_user(&self) -> Option<&str> {
        self.preauthenticated_user.as_deref()
    }

    fn security_context(&self) -> Option<&SecurityContext> {
        self.security_context.as_ref()
    }

    fn request_context(&self) -> RequestContext {
        self.context.clone()
    }
}
