//! Credential validation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use liaison_storage::{DirectoryStore, LocalUser, StorageError};

use crate::identity::RequestContext;
use crate::settings::BridgeSettings;
use crate::AuthError;

/// Trait for credential validators.
///
/// A validator maps an asserted principal (and optionally a credential) to a
/// local user. It may create the user on first sight and may resolve a
/// default identity when no principal is given.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Validates the request and returns the matching local user.
    ///
    /// # Arguments
    ///
    /// * `principal` - Asserted principal name, if any
    /// * `credential` - Secret presented with the principal, if any
    /// * `context` - Request metadata
    async fn authenticate(
        &self,
        principal: Option<&str>,
        credential: Option<&str>,
        context: &RequestContext,
    ) -> Result<LocalUser, AuthError>;

    /// Returns the name of this validator for logging.
    fn name(&self) -> &'static str;
}

/// Accepts principals asserted by a trusted upstream component.
///
/// No credential is checked: the front-end (reverse proxy, platform SSO)
/// has already authenticated the caller. Requests carrying a credential are
/// refused since this validator cannot verify one.
pub struct TrustedPrincipalValidator {
    store: Arc<dyn DirectoryStore>,
    auto_create_users: bool,
    login_downcase: bool,
    default_principal: Option<String>,
}

impl TrustedPrincipalValidator {
    /// Creates a validator with the default settings.
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self::from_settings(store, &BridgeSettings::default())
    }

    /// Creates a validator from bridge settings.
    pub fn from_settings(store: Arc<dyn DirectoryStore>, settings: &BridgeSettings) -> Self {
        Self {
            store,
            auto_create_users: settings.auto_create_users,
            login_downcase: settings.login_downcase,
            default_principal: settings.default_principal.clone(),
        }
    }

    fn normalize(&self, principal: &str) -> Option<String> {
        let trimmed = principal.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(if self.login_downcase {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        })
    }

    async fn find_or_create(&self, principal: &str) -> Result<LocalUser, AuthError> {
        let mut uow = self.store.begin().await?;

        if let Some(user) = uow.find_user_by_principal(principal).await? {
            uow.rollback().await?;
            return Ok(user);
        }

        if !self.auto_create_users {
            uow.rollback().await?;
            return Err(AuthError::UnknownUser(principal.to_string()));
        }

        match uow.insert_user(principal).await {
            Ok(user) => {
                uow.commit().await?;
                info!(principal = %user.principal, user_id = user.id, "Created local user");
                Ok(user)
            },
            Err(StorageError::AlreadyExists(_)) => {
                // Lost a race with a concurrent first login.
                drop(uow);
                let mut uow = self.store.begin().await?;
                let user = uow.find_user_by_principal(principal).await?;
                uow.rollback().await?;
                user.ok_or_else(|| AuthError::UnknownUser(principal.to_string()))
            },
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CredentialValidator for TrustedPrincipalValidator {
    async fn authenticate(
        &self,
        principal: Option<&str>,
        credential: Option<&str>,
        context: &RequestContext,
    ) -> Result<LocalUser, AuthError> {
        if credential.is_some() {
            return Err(AuthError::MethodNotEnabled("password".to_string()));
        }

        let principal = match principal.and_then(|p| self.normalize(p)) {
            Some(principal) => principal,
            None => {
                let fallback = self
                    .default_principal
                    .as_deref()
                    .and_then(|p| self.normalize(p))
                    .ok_or(AuthError::MissingPrincipal)?;
                debug!(principal = %fallback, "Using default principal");
                fallback
            },
        };

        debug!(
            principal = %principal,
            remote_addr = context.remote_addr.as_deref().unwrap_or("-"),
            "Validating trusted principal"
        );

        self.find_or_create(&principal).await
    }

    fn name(&self) -> &'static str {
        "trusted-principal"
    }
}
