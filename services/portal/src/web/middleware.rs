//! services/portal/src/web/middleware.rs
//!
//! Session-cookie authentication for REST routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use reading_portal_core::{ports::AccountStore, Identity};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Extracts the auth session id from the `Cookie` header, if any.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
        })
}

/// Resolves the request's identity. A missing, unknown, or expired session is `Anonymous`.
pub async fn identity_from_headers(accounts: &dyn AccountStore, headers: &HeaderMap) -> Identity {
    identity_for_session(accounts, session_cookie(headers)).await
}

pub async fn identity_for_session(
    accounts: &dyn AccountStore,
    auth_session_id: Option<&str>,
) -> Identity {
    let Some(auth_session_id) = auth_session_id else {
        return Identity::Anonymous;
    };
    match accounts.validate_auth_session(auth_session_id).await {
        Ok(user_id) => Identity::User(user_id),
        Err(e) => {
            debug!("Session cookie did not resolve to a user: {:?}", e);
            Identity::Anonymous
        }
    }
}

/// Middleware for routes that work both signed in and signed out.
///
/// Always inserts an `Identity` into the request extensions.
pub async fn resolve_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = identity_from_headers(state.accounts.as_ref(), req.headers()).await;
    req.extensions_mut().insert(identity);
    next.run(req).await
}

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_cookie(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id: Uuid = state
        .accounts
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user_id);
    req.extensions_mut().insert(Identity::User(user_id));

    Ok(next.run(req).await)
}
