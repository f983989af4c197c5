pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod reader;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::ConfigError;
use crate::error::ApiError;

// Re-export the main handlers to make them easily accessible
// to the binary that will build the web server router.
pub use middleware::{require_auth, resolve_identity};
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Builds the API router: public catalog routes, auth routes, the reader
/// channel, and the signed-in-only dashboard.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ConfigError::InvalidValue("ALLOWED_ORIGIN".to_string(), e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Identity is optional here; handlers see `Identity::Anonymous` when signed out.
    let catalog_routes = Router::new()
        .route("/library", get(rest::library_handler))
        .route("/documents/featured", get(rest::featured_handler))
        .route("/documents/{id}", get(rest::document_detail_handler))
        .route("/documents/{id}/start", post(rest::start_reading_handler))
        .route("/documents/{id}/bookmark", post(rest::toggle_bookmark_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            resolve_identity,
        ));

    let auth_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/ws", get(ws_handler));

    let protected_routes = Router::new()
        .route("/me/dashboard", get(rest::dashboard_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Ok(Router::new()
        .merge(catalog_routes)
        .merge(auth_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state))
}
