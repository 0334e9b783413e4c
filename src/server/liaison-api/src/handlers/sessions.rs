//! Session endpoints.

use std::net::SocketAddr;

use axum::{
    body::to_bytes,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use liaison_auth::{
    AuthenticationOutcome, FailureReason, GroupRefresh, RequestContext, SecurityContext, Session,
    SyncReport,
};
use liaison_storage::{LocalUser, UserId};

use crate::error::ApiError;
use crate::middleware::PreAuthenticatedUser;
use crate::state::AppState;
use crate::SESSION_HEADER;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Optional body of `POST /v1/sessions/authenticate`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthenticateRequest {
    /// Issue a persistent remember-me token on success.
    pub remember_me: bool,
}

/// User as exposed over the API.
#[derive(Debug, Serialize)]
pub struct UserView {
    /// Local user id.
    pub id: UserId,
    /// Principal name.
    pub principal: String,
    /// Canonical group names, sorted.
    pub groups: Vec<String>,
}

impl From<&LocalUser> for UserView {
    fn from(user: &LocalUser) -> Self {
        Self {
            id: user.id,
            principal: user.principal.clone(),
            groups: user.group_names().into_iter().map(str::to_string).collect(),
        }
    }
}

/// Response of `POST /v1/sessions/authenticate`.
#[derive(Debug, Serialize)]
pub struct AuthenticateResponse {
    /// Session identifier, also returned in the session header.
    pub session: String,
    /// `authenticated`, `anonymous` or `failed`.
    pub outcome: &'static str,
    /// The bound user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
    /// Why authentication failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    /// Plain remember-me token, returned once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remember_token: Option<String>,
}

/// Response of `POST /v1/sessions/groups`.
#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    /// Session identifier.
    pub session: String,
    /// `synchronized`, `already_synchronized`, `not_applicable` or `failed`.
    pub result: &'static str,
    /// Changes applied, when a synchronization ran.
    #[serde(flatten)]
    pub report: Option<SyncReport>,
}

/// Response of `POST /v1/sessions/logout`.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    /// Always true.
    pub logged_out: bool,
}

/// `POST /v1/sessions/authenticate`
///
/// Always answers 200 with the outcome, except for malformed input. Only
/// sessions left with an identity or a security context stay live.
pub async fn authenticate(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::InvalidBody(e.to_string()))?;
    let options: AuthenticateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AuthenticateRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidBody(e.to_string()))?
    };

    let requested = session_header(&parts.headers)?;
    let (session_id, handle) = state.sessions.open(requested.as_deref()).await;
    let mut session = handle.lock().await;

    let outcome = match established_user(&state, &mut session).await {
        Some(user) => AuthenticationOutcome::Authenticated(user),
        None => {
            let preauthenticated_user = parts
                .extensions
                .get::<PreAuthenticatedUser>()
                .and_then(|p| p.0.clone())
                .filter(|_| state.pre_auth.is_pre_auth_required(session.is_established()));
            let context = RequestContext {
                session_id: None,
                remote_addr: parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.to_string()),
            };
            state
                .bridge
                .authenticate_session(&mut session, preauthenticated_user, context)
                .await
        },
    };
    state.sessions.retain(&session_id, &handle, &session).await;

    let remember_token = match outcome.user() {
        Some(user) if options.remember_me => {
            match state.bridge.issue_remember_token(user).await {
                Ok(token) => Some(token),
                Err(e) => {
                    warn!(principal = %user.principal, error = %e, "Failed to issue remember-me token");
                    None
                },
            }
        },
        _ => None,
    };

    let reason = match outcome {
        AuthenticationOutcome::Failed(reason) => Some(reason),
        _ => None,
    };

    let body = AuthenticateResponse {
        session: session_id.clone(),
        outcome: outcome.label(),
        user: outcome.user().map(UserView::from),
        reason,
        remember_token,
    };

    Ok(([(SESSION_HEADER, session_id)], Json(body)).into_response())
}

/// `POST /v1/sessions/groups`
pub async fn refresh_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GroupsResponse>, ApiError> {
    let id = session_header(&headers)?.ok_or(ApiError::UnknownSession)?;
    let handle = state
        .sessions
        .get(&id)
        .await
        .ok_or(ApiError::UnknownSession)?;
    let mut session = handle.lock().await;

    let (result, report) = match state.bridge.refresh_session_groups(&mut session).await {
        GroupRefresh::Synchronized(report) => ("synchronized", Some(report)),
        GroupRefresh::AlreadySynchronized => ("already_synchronized", None),
        GroupRefresh::NotApplicable => ("not_applicable", None),
        GroupRefresh::Failed => ("failed", None),
    };

    Ok(Json(GroupsResponse {
        session: id,
        result,
        report,
    }))
}

/// `POST /v1/sessions/logout`
///
/// Always answers 200; unknown or missing sessions are already logged out.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<LogoutResponse> {
    if let Some(id) = session_header(&headers).ok().flatten() {
        if let Some(handle) = state.sessions.get(&id).await {
            let mut session = handle.lock().await;
            state.bridge.logout(&mut session).await;
            drop(session);
            state.sessions.remove(&id).await;
        }
    }

    Json(LogoutResponse { logged_out: true })
}

/// `PUT /v1/sessions/context`
///
/// Development stand-in for the platform single-sign-on layer. Without a
/// session header a new session is created and returned in the header.
pub async fn attach_context(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(context): Json<SecurityContext>,
) -> Result<Response, ApiError> {
    let id = match session_header(&headers)? {
        Some(id) => id,
        None => state.sessions.create().await.0,
    };
    if state.sessions.attach_security_context(&id, context).await {
        Ok((StatusCode::NO_CONTENT, [(SESSION_HEADER, id)]).into_response())
    } else {
        Err(ApiError::UnknownSession)
    }
}

/// Returns the user of an established session.
///
/// A session whose user can no longer be loaded loses its identity.
async fn established_user(state: &AppState, session: &mut Session) -> Option<LocalUser> {
    if !session.is_established() {
        return None;
    }

    match state.bridge.session_user(session).await {
        Ok(Some(user)) => {
            debug!(session = %session.id(), principal = %user.principal, "Session already established");
            Some(user)
        },
        Ok(None) => {
            session.clear_identity();
            None
        },
        Err(e) => {
            warn!(session = %session.id(), error = %e, "Failed to load session user");
            session.clear_identity();
            None
        },
    }
}

fn session_header(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    headers
        .get(SESSION_HEADER)
        .map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .map_err(|_| ApiError::InvalidHeader(SESSION_HEADER.to_string()))
        })
        .transpose()
}
