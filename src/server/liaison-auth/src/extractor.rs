//! Extraction of the externally asserted identity from a request.

use tracing::debug;

use crate::identity::{CredentialSource, ExternalIdentity, IdentitySource};

/// Reads the external identity off an inbound request.
///
/// A pre-authenticated principal wins over a platform security context.
/// A blank pre-authenticated value counts as not set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalPrincipalExtractor;

impl ExternalPrincipalExtractor {
    /// Extracts the identity. Absence of evidence is not an error.
    pub fn extract<R>(&self, request: &R) -> ExternalIdentity
    where
        R: CredentialSource + ?Sized,
    {
        if let Some(user) = request
            .preauthenticated_user()
            .filter(|u| !u.trim().is_empty())
        {
            debug!(principal = %user, "Using pre-authenticated principal");
            return ExternalIdentity {
                principal_name: Some(user.to_string()),
                external_group_ids: None,
                source: IdentitySource::PreAuthenticated,
            };
        }

        if let Some(context) = request.security_context() {
            let groups = context.group_fqns();
            debug!(
                principal = ?context.identity,
                groups = groups.len(),
                "Using platform security context"
            );
            return ExternalIdentity {
                principal_name: context.identity.clone(),
                external_group_ids: Some(groups),
                source: IdentitySource::SecurityContext,
            };
        }

        ExternalIdentity::absent()
    }
}
