//! Per-route authorization middleware.
//!
//! The `Authorization` header carries the raw token. A missing header is not
//! an error: the caller is treated as [`UserType::Unknown`] and falls through
//! to the forbidden branch.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::token::{TokenError, TokenIssuer};
use crate::housing::domain::{UserId, UserType};

/// Verified caller identity, inserted into request extensions by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub user_type: UserType,
}

impl AuthenticatedUser {
    const ANONYMOUS: Self = Self {
        user_id: UserId(Uuid::nil()),
        user_type: UserType::Unknown,
    };
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("invalid token")]
    Unauthorized(#[source] TokenError),
    #[error("insufficient permissions")]
    Forbidden,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = match self {
            GateError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GateError::Forbidden => StatusCode::FORBIDDEN,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Resolves the caller from the request headers and checks the role against `allowed`.
pub fn authorize(
    tokens: &TokenIssuer,
    headers: &HeaderMap,
    allowed: &[UserType],
) -> Result<AuthenticatedUser, GateError> {
    let caller = match headers.get(AUTHORIZATION) {
        None => AuthenticatedUser::ANONYMOUS,
        Some(value) => {
            let raw = value.to_str().map_err(|err| {
                GateError::Unauthorized(TokenError::Malformed(err.to_string()))
            })?;
            let (user_type, user_id) = tokens.verify(raw).map_err(|err| {
                debug!(error = %err, "rejecting token");
                GateError::Unauthorized(err)
            })?;
            AuthenticatedUser { user_id, user_type }
        }
    };

    if allowed.contains(&caller.user_type) {
        Ok(caller)
    } else {
        debug!(role = caller.user_type.label(), "role not permitted for route");
        Err(GateError::Forbidden)
    }
}

/// Admits users and moderators.
pub async fn user_auth(
    State(tokens): State<Arc<TokenIssuer>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let caller = authorize(
        &tokens,
        request.headers(),
        &[UserType::User, UserType::Moderator],
    )?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// Admits moderators only; downstream handlers read the identity from
/// `Extension<AuthenticatedUser>`.
pub async fn moderator_auth(
    State(tokens): State<Arc<TokenIssuer>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let caller = authorize(&tokens, request.headers(), &[UserType::Moderator])?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
