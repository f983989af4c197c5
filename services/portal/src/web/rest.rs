//! services/portal/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::web::state::AppState;
use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use reading_portal_core::{
    catalog::{self, CatalogQuery, CatalogResult},
    domain::{BookmarkEntry, Document, ProgressEntry, ReadingProgress},
    filter::{self, QueryParams},
    BookmarkState, BookmarkToggle, Identity, IdentityCell, PortalError, ProgressTracker,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        library_handler,
        featured_handler,
        document_detail_handler,
        start_reading_handler,
        toggle_bookmark_handler,
        dashboard_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
    ),
    components(
        schemas(
            LibraryResponse,
            FilterView,
            FeaturedResponse,
            DocumentDetailResponse,
            StartReadingResponse,
            ToggleBookmarkRequest,
            ToggleBookmarkResponse,
            DashboardResponse,
            SignupRequest,
            LoginRequest,
            AuthResponse,
        )
    ),
    tags(
        (name = "Reading Portal API", description = "Catalog browsing, reading progress, and bookmarks.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The filter the listing was produced for, as decoded from the query string.
#[derive(Serialize, ToSchema)]
pub struct FilterView {
    pub search: String,
    /// Category slug, absent for "All".
    pub category: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LibraryResponse {
    pub filter: FilterView,
    /// The query string that encodes `filter`, without a leading `?`.
    pub canonical_query: String,
    #[schema(value_type = Object)]
    pub result: CatalogResult,
    /// Document id to completion percentage, for the signed-in user.
    #[schema(value_type = Object)]
    pub progress: HashMap<Uuid, u8>,
}

#[derive(Serialize, ToSchema)]
pub struct FeaturedResponse {
    #[schema(value_type = Vec<Object>)]
    pub documents: Vec<Document>,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentDetailResponse {
    #[schema(value_type = Object)]
    pub document: Document,
    #[schema(value_type = Option<Object>)]
    pub progress: Option<ReadingProgress>,
    pub bookmarked: bool,
}

#[derive(Serialize, ToSchema)]
pub struct StartReadingResponse {
    pub document_id: Uuid,
    pub start_page: u32,
    /// True when an earlier reading position existed.
    pub resumed: bool,
}

/// The bookmark state the client is currently showing.
#[derive(Deserialize, ToSchema)]
pub struct ToggleBookmarkRequest {
    pub bookmarked: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ToggleBookmarkResponse {
    pub bookmarked: bool,
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    #[schema(value_type = Vec<Object>)]
    pub reading: Vec<ProgressEntry>,
    #[schema(value_type = Vec<Object>)]
    pub bookmarks: Vec<BookmarkEntry>,
}

/// Maps a portal error to the HTTP status the client acts on.
pub fn portal_error(err: PortalError) -> (StatusCode, String) {
    let status = match err {
        PortalError::Unauthenticated => StatusCode::UNAUTHORIZED,
        PortalError::NotFound(_) => StatusCode::NOT_FOUND,
        PortalError::Remote(_) | PortalError::RenderFailure(_) => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Browse the catalog.
///
/// Accepts `search` and `category` query parameters. Unknown categories are
/// treated as "All".
#[utoipa::path(
    get,
    path = "/library",
    params(
        ("search" = Option<String>, Query, description = "Case-insensitive text filter."),
        ("category" = Option<String>, Query, description = "Category slug, e.g. `vedas`.")
    ),
    responses(
        (status = 200, description = "Matching documents", body = LibraryResponse),
        (status = 502, description = "The catalog query failed", body = LibraryResponse)
    )
)]
pub async fn library_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    RawQuery(raw): RawQuery,
) -> impl IntoResponse {
    let params = QueryParams::parse(raw.as_deref().unwrap_or_default());
    let filter_state = filter::decode(&params);
    let query = CatalogQuery::build(&filter_state);

    let store = app_state.store.as_ref();
    let progress = async {
        let Some(user_id) = identity.user_id() else {
            return HashMap::new();
        };
        match store.progress_percentages(user_id).await {
            Ok(rows) => rows.into_iter().collect(),
            Err(e) => {
                warn!(%user_id, "Failed to load progress overlay: {:?}", e);
                HashMap::new()
            }
        }
    };
    let (result, progress) = tokio::join!(catalog::execute(store, &query), progress);

    let status = if result.is_error() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    let response = LibraryResponse {
        filter: FilterView {
            search: filter_state.query.clone(),
            category: filter_state.category.category().map(|c| c.slug()),
        },
        canonical_query: filter::to_params(&filter_state).to_query_string(),
        result,
        progress,
    };
    (status, Json(response))
}

/// List featured documents.
#[utoipa::path(
    get,
    path = "/documents/featured",
    responses(
        (status = 200, description = "Featured documents", body = FeaturedResponse),
        (status = 502, description = "The catalog query failed")
    )
)]
pub async fn featured_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<FeaturedResponse>, (StatusCode, String)> {
    let documents = app_state
        .store
        .featured_documents(app_state.config.featured_limit)
        .await
        .map_err(|e| {
            error!("Failed to load featured documents: {:?}", e);
            portal_error(PortalError::Remote(e.to_string()))
        })?;
    Ok(Json(FeaturedResponse { documents }))
}

/// Show one document, with the caller's progress and bookmark when signed in.
#[utoipa::path(
    get,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id.")),
    responses(
        (status = 200, description = "The document", body = DocumentDetailResponse),
        (status = 404, description = "No such document")
    )
)]
pub async fn document_detail_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DocumentDetailResponse>, (StatusCode, String)> {
    let document = load_document(&app_state, document_id).await?;

    let (progress, bookmarked) = match identity.user_id() {
        Some(user_id) => {
            let store = app_state.store.as_ref();
            let bookmarks = BookmarkToggle::new(app_state.store.clone());
            let progress = async {
                store
                    .get_progress(user_id, document_id)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(%user_id, %document_id, "Failed to load reading progress: {:?}", e);
                        None
                    })
            };
            tokio::join!(progress, bookmarks.status(user_id, document_id))
        }
        None => (None, BookmarkState::NotBookmarked),
    };

    Ok(Json(DocumentDetailResponse {
        document,
        progress,
        bookmarked: bookmarked.is_bookmarked(),
    }))
}

/// Mark a document as started and get the page to open it at.
///
/// Signed-out callers, and documents with no content, get page 1 and nothing is stored.
#[utoipa::path(
    post,
    path = "/documents/{id}/start",
    params(("id" = Uuid, Path, description = "Document id.")),
    responses(
        (status = 200, description = "Reading started", body = StartReadingResponse),
        (status = 404, description = "No such document")
    )
)]
pub async fn start_reading_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<StartReadingResponse>, (StatusCode, String)> {
    let document = load_document(&app_state, document_id).await?;
    if document.content_url.is_none() {
        debug!(%document_id, "Document has no content; not recording progress.");
        return Ok(Json(StartReadingResponse {
            document_id,
            start_page: 1,
            resumed: false,
        }));
    }

    let tracker = ProgressTracker::new(
        app_state.store.clone(),
        Arc::new(IdentityCell::resolved(identity)),
    )
    .with_seed_percentage(app_state.config.seed_progress_percent);
    let resume = tracker.begin_reading(document_id).await;

    Ok(Json(StartReadingResponse {
        document_id,
        start_page: resume.start_page,
        resumed: resume.prior.is_some(),
    }))
}

/// Add or remove the caller's bookmark on a document.
#[utoipa::path(
    post,
    path = "/documents/{id}/bookmark",
    params(("id" = Uuid, Path, description = "Document id.")),
    request_body = ToggleBookmarkRequest,
    responses(
        (status = 200, description = "The confirmed new state", body = ToggleBookmarkResponse),
        (status = 401, description = "Sign in required"),
        (status = 502, description = "The store rejected the change")
    )
)]
pub async fn toggle_bookmark_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(document_id): Path<Uuid>,
    Json(req): Json<ToggleBookmarkRequest>,
) -> Result<Json<ToggleBookmarkResponse>, (StatusCode, String)> {
    let state = BookmarkToggle::new(app_state.store.clone())
        .toggle(
            identity.user_id(),
            document_id,
            BookmarkState::from(req.bookmarked),
        )
        .await
        .map_err(portal_error)?;

    Ok(Json(ToggleBookmarkResponse {
        bookmarked: state.is_bookmarked(),
    }))
}

/// The signed-in user's reading history and bookmarks.
#[utoipa::path(
    get,
    path = "/me/dashboard",
    responses(
        (status = 200, description = "Dashboard lists", body = DashboardResponse),
        (status = 401, description = "Sign in required")
    )
)]
pub async fn dashboard_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Json<DashboardResponse> {
    let store = app_state.store.as_ref();
    let (reading, bookmarks) = tokio::join!(store.list_progress(user_id), store.list_bookmarks(user_id));

    let reading = reading.unwrap_or_else(|e| {
        warn!(%user_id, "Failed to load reading history: {:?}", e);
        Vec::new()
    });
    let bookmarks = bookmarks.unwrap_or_else(|e| {
        warn!(%user_id, "Failed to load bookmarks: {:?}", e);
        Vec::new()
    });

    Json(DashboardResponse { reading, bookmarks })
}

/// Point read of the primary entity. Any failure is reported as "not found".
async fn load_document(
    app_state: &AppState,
    document_id: Uuid,
) -> Result<Document, (StatusCode, String)> {
    let not_found = || portal_error(PortalError::NotFound(format!("Document {}", document_id)));
    match app_state.store.get_document(document_id).await {
        Ok(Some(document)) => Ok(document),
        Ok(None) => Err(not_found()),
        Err(e) => {
            error!(%document_id, "Failed to load document: {:?}", e);
            Err(not_found())
        }
    }
}
