//! # Liaison Auth
//!
//! Bridges externally asserted identities into local users.
//!
//! ## Flow
//!
//! - [`ExternalPrincipalExtractor`] reads a pre-authenticated principal or a
//!   platform security context off the request
//! - a [`CredentialValidator`] maps the principal to a local user
//! - [`GroupSynchronizer`] replaces the user's memberships with the groups
//!   asserted by the security context, atomically
//! - [`AuthenticationBridge`] ties the steps together and returns an
//!   [`AuthenticationOutcome`] the caller binds to its [`Session`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod outcome;
pub mod remember;
pub mod reporter;
pub mod resolver;
pub mod session;
pub mod settings;
pub mod sync;
pub mod validator;

#[cfg(test)]
mod testing;

pub use bridge::{AuthenticationBridge, LogoutHook};
pub use error::{AuthError, SyncError};
pub use extractor::ExternalPrincipalExtractor;
pub use identity::{
    AuthRequest, CredentialSource, ExternalIdentity, IdentitySource, RequestContext,
    SecurityContext, SecurityGroup,
};
pub use outcome::{AuthenticationOutcome, FailureReason};
pub use remember::RememberMe;
pub use reporter::{FailureKind, FailureRecord, FailureReporter, LogFailureReporter};
pub use resolver::GroupNameResolver;
pub use session::{GroupRefresh, Session};
pub use settings::{BridgeSettings, PreAuthSettings, DEFAULT_PREAUTH_HEADER};
pub use sync::{GroupSynchronizer, SyncReport};
pub use validator::{CredentialValidator, TrustedPrincipalValidator};
