//! Pre-authentication header middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

/// Principal asserted by the upstream component, if pre-auth is enabled.
#[derive(Debug, Clone, Default)]
pub struct PreAuthenticatedUser(pub Option<String>);

/// Copies the configured pre-auth header into a [`PreAuthenticatedUser`]
/// request extension.
///
/// When pre-auth is disabled the header is ignored, so a client cannot
/// assert a principal by sending it.
pub async fn pre_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = if state.pre_auth.enabled {
        let user = request
            .headers()
            .get(state.pre_auth.header_name.as_str())
            .map(|value| {
                value
                    .to_str()
                    .map(str::to_string)
                    .map_err(|_| ApiError::InvalidHeader(state.pre_auth.header_name.clone()))
            })
            .transpose()?
            .filter(|v| !v.trim().is_empty());
        if user.is_none() {
            info!(header = %state.pre_auth.header_name, "Pre-auth header not found in request");
            debug!(
                headers = ?request.headers().keys().map(|k| k.as_str()).collect::<Vec<_>>(),
                "Available request headers"
            );
        }
        user
    } else {
        None
    };

    request.extensions_mut().insert(PreAuthenticatedUser(user));
    Ok(next.run(request).await)
}
