//! The authentication bridge.
//!
//! Turns the external identity found on a request into a local user with
//! synchronized group memberships:
//!
//! ```text
//! extract ──► validate ──► (group data?) ──► sync ──► Authenticated
//!                │                             │
//!                ├─ principal asserted ─► Failed ◄┘
//!                └─ no principal ─────► Anonymous
//! ```
//!
//! Every failure is absorbed into an [`AuthenticationOutcome`] plus a
//! [`FailureRecord`]; nothing is raised to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use liaison_storage::{DirectoryStore, LocalUser, UserId};

use crate::extractor::ExternalPrincipalExtractor;
use crate::identity::{AuthRequest, CredentialSource, RequestContext};
use crate::outcome::{AuthenticationOutcome, FailureReason};
use crate::remember::RememberMe;
use crate::reporter::{FailureKind, FailureRecord, FailureReporter, LogFailureReporter};
use crate::session::{GroupRefresh, Session};
use crate::settings::BridgeSettings;
use crate::sync::GroupSynchronizer;
use crate::validator::{CredentialValidator, TrustedPrincipalValidator};
use crate::AuthError;

/// Host hook run before a session is logged out.
#[async_trait]
pub trait LogoutHook: Send + Sync {
    /// Called with the bound user before the session is invalidated.
    ///
    /// An error is reported but does not prevent the logout.
    async fn before_logout(&self, user_id: UserId) -> Result<(), AuthError>;
}

/// Drives one authentication flow per request.
#[derive(Clone)]
pub struct AuthenticationBridge {
    store: Arc<dyn DirectoryStore>,
    extractor: ExternalPrincipalExtractor,
    validator: Arc<dyn CredentialValidator>,
    synchronizer: GroupSynchronizer,
    remember_me: RememberMe,
    reporter: Arc<dyn FailureReporter>,
    logout_hook: Option<Arc<dyn LogoutHook>>,
}

impl AuthenticationBridge {
    /// Creates a bridge that reports failures to the log.
    pub fn new(store: Arc<dyn DirectoryStore>, validator: Arc<dyn CredentialValidator>) -> Self {
        Self {
            extractor: ExternalPrincipalExtractor,
            validator,
            synchronizer: GroupSynchronizer::new(Arc::clone(&store)),
            remember_me: RememberMe::new(Arc::clone(&store)),
            reporter: Arc::new(LogFailureReporter),
            logout_hook: None,
            store,
        }
    }

    /// Creates a bridge backed by a [`TrustedPrincipalValidator`].
    pub fn from_settings(store: Arc<dyn DirectoryStore>, settings: &BridgeSettings) -> Self {
        let validator = TrustedPrincipalValidator::from_settings(Arc::clone(&store), settings);
        Self::new(store, Arc::new(validator))
    }

    /// Replaces the failure reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Installs a pre-logout hook.
    pub fn with_logout_hook(mut self, hook: Arc<dyn LogoutHook>) -> Self {
        self.logout_hook = Some(hook);
        self
    }

    /// Runs the authentication flow for a request.
    pub async fn authenticate<R>(&self, request: &R) -> AuthenticationOutcome
    where
        R: CredentialSource + Sync + ?Sized,
    {
        self.run(request).await.0
    }

    /// Authenticates a request made on `session` and binds the outcome.
    ///
    /// The session's security context, if any, is part of the request.
    pub async fn authenticate_session(
        &self,
        session: &mut Session,
        preauthenticated_user: Option<String>,
        context: RequestContext,
    ) -> AuthenticationOutcome {
        let request = AuthRequest {
            preauthenticated_user,
            security_context: session.security_context().cloned(),
            context: RequestContext {
                session_id: Some(session.id().to_string()),
                ..context
            },
        };

        let (outcome, synced_from_context) = self.run(&request).await;
        session.bind(&outcome);
        if outcome.is_authenticated() && synced_from_context {
            session.mark_groups_synchronized();
        }
        outcome
    }

    /// Re-synchronizes the bound user's groups from the session's security
    /// context, once per session and context.
    pub async fn refresh_session_groups(&self, session: &mut Session) -> GroupRefresh {
        let (Some(user_id), Some(context)) = (session.user_id(), session.security_context())
        else {
            return GroupRefresh::NotApplicable;
        };
        if session.groups_synchronized() {
            return GroupRefresh::AlreadySynchronized;
        }
        let external_group_ids = context.group_fqns();

        let result = match self.load_user(user_id).await {
            Ok(Some(mut user)) => self
                .synchronizer
                .sync(&mut user, &external_group_ids)
                .await
                .map_err(|e| (Some(user.principal), e.to_string())),
            Ok(None) => Err((None, format!("user not found: {user_id}"))),
            Err(e) => Err((None, e.to_string())),
        };

        match result {
            Ok(report) => {
                session.mark_groups_synchronized();
                GroupRefresh::Synchronized(report)
            },
            Err((principal, message)) => {
                self.reporter.report(&FailureRecord::new(
                    principal.as_deref(),
                    FailureKind::GroupSync,
                    message,
                ));
                session.clear_identity();
                GroupRefresh::Failed
            },
        }
    }

    /// Logs the session out.
    ///
    /// Runs the pre-logout hook, clears the remember-me token and invalidates
    /// the session. Hook and token failures are reported; the session is
    /// invalidated regardless.
    pub async fn logout(&self, session: &mut Session) {
        if let Some(user_id) = session.user_id() {
            let mut failures = Vec::new();

            if let Some(hook) = &self.logout_hook {
                if let Err(e) = hook.before_logout(user_id).await {
                    failures.push(e.to_string());
                }
            }

            if let Err(e) = self.remember_me.clear(user_id).await {
                failures.push(e.to_string());
            }

            if !failures.is_empty() {
                let principal = self.load_user(user_id).await.ok().flatten().map(|u| u.principal);
                for message in failures {
                    self.reporter.report(&FailureRecord::new(
                        principal.as_deref(),
                        FailureKind::Logout,
                        message,
                    ));
                }
            }
        }

        session.invalidate();
        info!(session = %session.id(), "Session logged out");
    }

    /// Issues a remember-me token for the user.
    pub async fn issue_remember_token(&self, user: &LocalUser) -> Result<String, AuthError> {
        self.remember_me.issue(user.id).await
    }

    /// Returns the user when the remember-me token is valid.
    pub async fn verify_remember_token(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<Option<LocalUser>, AuthError> {
        self.remember_me.verify(user_id, token).await
    }

    /// Loads the user bound to the session.
    pub async fn session_user(&self, session: &Session) -> Result<Option<LocalUser>, AuthError> {
        match session.user_id() {
            Some(user_id) if session.is_established() => self.load_user(user_id).await,
            _ => Ok(None),
        }
    }

    /// Name of the configured credential validator.
    pub fn validator_name(&self) -> &'static str {
        self.validator.name()
    }

    /// Returns the outcome and whether memberships were synchronized.
    async fn run<R>(&self, request: &R) -> (AuthenticationOutcome, bool)
    where
        R: CredentialSource + Sync + ?Sized,
    {
        let identity = self.extractor.extract(request);
        let context = request.request_context();
        let principal = identity.principal();

        let mut user = match self.validator.authenticate(principal, None, &context).await {
            Ok(user) => user,
            Err(AuthError::MissingPrincipal) if principal.is_none() => {
                debug!("No principal asserted, continuing anonymously");
                return (AuthenticationOutcome::Anonymous, false);
            },
            Err(e) => {
                self.reporter.report(&FailureRecord::new(
                    principal,
                    FailureKind::CredentialValidation,
                    e.to_string(),
                ));
                let outcome = match principal {
                    Some(_) => AuthenticationOutcome::Failed(FailureReason::CredentialsRejected),
                    None => AuthenticationOutcome::Anonymous,
                };
                return (outcome, false);
            },
        };

        let synced = match identity.external_group_ids.as_deref() {
            Some(external_group_ids) => {
                if let Err(e) = self.synchronizer.sync(&mut user, external_group_ids).await {
                    self.reporter.report(&FailureRecord::new(
                        Some(&user.principal),
                        FailureKind::GroupSync,
                        e.to_string(),
                    ));
                    return (
                        AuthenticationOutcome::Failed(FailureReason::GroupSyncFailed),
                        false,
                    );
                }
                true
            },
            None => false,
        };

        info!(
            principal = %user.principal,
            source = ?identity.source,
            validator = self.validator.name(),
            groups = ?user.group_names(),
            "User authenticated"
        );

        (AuthenticationOutcome::Authenticated(user), synced)
    }

    async fn load_user(&self, user_id: UserId) -> Result<Option<LocalUser>, AuthError> {
        let mut uow = self.store.begin().await?;
        let user = uow.find_user(user_id).await?;
        uow.rollback().await?;
        Ok(user)
    }
}
