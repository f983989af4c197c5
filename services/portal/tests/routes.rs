//! Router-level tests for the portal REST API, backed by the in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use portal_lib::config::Config;
use portal_lib::web::{build_router, AppState};
use reading_portal_core::memory::{sample_document, InMemoryStore};
use reading_portal_core::ports::AccountStore;
use reading_portal_core::Document;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn test_config() -> Config {
    Config {
        bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        allowed_origin: "http://localhost:5173".to_string(),
        progress_debounce: Duration::from_millis(1000),
        seed_progress_percent: 5,
        auth_session_days: 30,
        featured_limit: 2,
    }
}

fn test_router(store: &InMemoryStore) -> Router {
    let state = Arc::new(AppState {
        store: Arc::new(store.clone()),
        accounts: Arc::new(store.clone()),
        config: Arc::new(test_config()),
    });
    build_router(state).expect("router")
}

/// Registers a user with a live session and returns (user id, cookie header value).
async fn signed_in(store: &InMemoryStore) -> (Uuid, String) {
    let email = format!("{}@example.org", Uuid::new_v4());
    let user = store
        .create_user_with_email(&email, "not-a-real-hash")
        .await
        .expect("create user");
    let session_id = Uuid::new_v4().to_string();
    store
        .create_auth_session(&session_id, user.user_id, Utc::now() + chrono::Duration::days(1))
        .await
        .expect("create session");
    (user.user_id, format!("session={session_id}"))
}

fn add(store: &InMemoryStore, title: &str, category: &str) -> Document {
    let document = sample_document(title, category);
    store.add_document(document.clone());
    document
}

async fn request(
    router: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value, Option<String>), String> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    let req = if let Some(payload) = body {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        let bytes =
            serde_json::to_vec(&payload).map_err(|err| format!("serialize request body: {err}"))?;
        builder
            .body(Body::from(bytes))
            .map_err(|err| format!("build request: {err}"))?
    } else {
        builder
            .body(Body::empty())
            .map_err(|err| format!("build request: {err}"))?
    };

    let response = router
        .clone()
        .oneshot(req)
        .await
        .map_err(|err| format!("route request: {err}"))?;
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .map_err(|err| format!("read response body: {err}"))?;

    let parsed = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    Ok((status, parsed, set_cookie))
}

fn titles(documents: &Value) -> Vec<String> {
    documents
        .as_array()
        .map(|docs| {
            docs.iter()
                .filter_map(|d| d.get("title").and_then(Value::as_str).map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn library_filters_by_category_and_search() -> Result<(), String> {
    let store = InMemoryStore::new();
    add(&store, "Samaveda", "Vedas");
    add(&store, "Rigveda", "Vedas");
    add(&store, "Ramayana", "Itihasa");
    let router = test_router(&store);

    let (status, body, _) =
        request(&router, Method::GET, "/library?category=vedas", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["status"], "ok");
    assert_eq!(titles(&body["result"]["documents"]), ["Rigveda", "Samaveda"]);
    assert_eq!(body["canonical_query"], "category=vedas");

    let (_, body, _) = request(&router, Method::GET, "/library?search=RAMA", None, None).await?;
    assert_eq!(titles(&body["result"]["documents"]), ["Ramayana"]);
    assert_eq!(body["filter"]["search"], "RAMA");
    assert_eq!(body["filter"]["category"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn unknown_category_lists_everything() -> Result<(), String> {
    let store = InMemoryStore::new();
    add(&store, "Rigveda", "Vedas");
    add(&store, "Ramayana", "Itihasa");
    let router = test_router(&store);

    let (status, body, _) =
        request(&router, Method::GET, "/library?category=poetry", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body["result"]["documents"]).len(), 2);
    assert_eq!(body["canonical_query"], "");
    Ok(())
}

#[tokio::test]
async fn library_overlays_progress_for_signed_in_user() -> Result<(), String> {
    let store = InMemoryStore::new();
    let doc = add(&store, "Mahabharata", "Itihasa");
    let (_, cookie) = signed_in(&store).await;
    let router = test_router(&store);

    let uri = format!("/documents/{}/start", doc.id);
    request(&router, Method::POST, &uri, Some(&cookie), None).await?;

    let (_, body, _) = request(&router, Method::GET, "/library", Some(&cookie), None).await?;
    assert_eq!(body["progress"][doc.id.to_string()], 5);

    let (_, anonymous, _) = request(&router, Method::GET, "/library", None, None).await?;
    assert_eq!(anonymous["progress"], json!({}));
    Ok(())
}

#[tokio::test]
async fn failed_catalog_query_is_reported() -> Result<(), String> {
    let store = InMemoryStore::new();
    add(&store, "Rigveda", "Vedas");
    store.inject_failure("query_documents");
    let router = test_router(&store);

    let (status, body, _) = request(&router, Method::GET, "/library", None, None).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["result"]["status"], "error");
    assert_eq!(body["result"]["kind"], "remote");
    Ok(())
}

#[tokio::test]
async fn featured_respects_configured_limit() -> Result<(), String> {
    let store = InMemoryStore::new();
    for title in ["Rigveda", "Yajurveda", "Atharvaveda"] {
        let mut doc = sample_document(title, "Vedas");
        doc.featured = true;
        store.add_document(doc);
    }
    add(&store, "Garuda Purana", "Puranas");
    let router = test_router(&store);

    let (status, body, _) =
        request(&router, Method::GET, "/documents/featured", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body["documents"]).len(), 2);
    Ok(())
}

#[tokio::test]
async fn detail_of_missing_document_is_not_found() -> Result<(), String> {
    let store = InMemoryStore::new();
    let doc = add(&store, "Vishnu Purana", "Puranas");
    let router = test_router(&store);

    let uri = format!("/documents/{}", Uuid::new_v4());
    let (status, _, _) = request(&router, Method::GET, &uri, None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    store.inject_failure("get_document");
    let uri = format!("/documents/{}", doc.id);
    let (status, _, _) = request(&router, Method::GET, &uri, None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn detail_degrades_when_progress_read_fails() -> Result<(), String> {
    let store = InMemoryStore::new();
    let doc = add(&store, "Vishnu Purana", "Puranas");
    let (_, cookie) = signed_in(&store).await;
    store.inject_failure("get_progress");
    let router = test_router(&store);

    let uri = format!("/documents/{}", doc.id);
    let (status, body, _) = request(&router, Method::GET, &uri, Some(&cookie), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["document"]["title"], "Vishnu Purana");
    assert_eq!(body["progress"], Value::Null);
    assert_eq!(body["bookmarked"], false);
    Ok(())
}

#[tokio::test]
async fn start_reading_seeds_then_resumes() -> Result<(), String> {
    let store = InMemoryStore::new();
    let doc = add(&store, "Ramayana", "Itihasa");
    let (user, cookie) = signed_in(&store).await;
    let router = test_router(&store);
    let uri = format!("/documents/{}/start", doc.id);

    let (status, body, _) = request(&router, Method::POST, &uri, Some(&cookie), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start_page"], 1);
    assert_eq!(body["resumed"], false);

    let mut progress = store.stored_progress(user, doc.id).ok_or("seeded row")?;
    assert_eq!(progress.progress_percentage, 5);

    progress.current_chapter = 12;
    progress.progress_percentage = 40;
    reading_portal_core::ports::RemoteStore::upsert_progress(&store, &progress)
        .await
        .map_err(|e| e.to_string())?;

    let (_, body, _) = request(&router, Method::POST, &uri, Some(&cookie), None).await?;
    assert_eq!(body["start_page"], 12);
    assert_eq!(body["resumed"], true);
    let kept = store.stored_progress(user, doc.id).ok_or("kept row")?;
    assert_eq!(kept.progress_percentage, 40);
    Ok(())
}

#[tokio::test]
async fn anonymous_start_reading_stores_nothing() -> Result<(), String> {
    let store = InMemoryStore::new();
    let doc = add(&store, "Ramayana", "Itihasa");
    let router = test_router(&store);

    let uri = format!("/documents/{}/start", doc.id);
    let (status, body, _) = request(&router, Method::POST, &uri, None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start_page"], 1);
    assert!(store.progress_writes().is_empty());
    Ok(())
}

#[tokio::test]
async fn start_reading_without_content_stores_nothing() -> Result<(), String> {
    let store = InMemoryStore::new();
    let mut doc = sample_document("Manusmriti", "Shastra");
    doc.content_url = None;
    store.add_document(doc.clone());
    let (user, cookie) = signed_in(&store).await;
    let router = test_router(&store);

    let uri = format!("/documents/{}/start", doc.id);
    let (status, body, _) = request(&router, Method::POST, &uri, Some(&cookie), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start_page"], 1);
    assert_eq!(body["resumed"], false);
    assert!(store.progress_writes().is_empty());
    assert!(store.stored_progress(user, doc.id).is_none());
    Ok(())
}

#[tokio::test]
async fn bookmark_toggle_requires_sign_in_and_reports_failures() -> Result<(), String> {
    let store = InMemoryStore::new();
    let doc = add(&store, "Arthashastra", "Shastra");
    let (user, cookie) = signed_in(&store).await;
    let router = test_router(&store);
    let uri = format!("/documents/{}/bookmark", doc.id);

    let (status, _, _) = request(
        &router,
        Method::POST,
        &uri,
        None,
        Some(json!({ "bookmarked": false })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body, _) = request(
        &router,
        Method::POST,
        &uri,
        Some(&cookie),
        Some(json!({ "bookmarked": false })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookmarked"], true);
    assert!(store.has_bookmark(user, doc.id));

    store.inject_failure("delete_bookmark");
    let (status, _, _) = request(
        &router,
        Method::POST,
        &uri,
        Some(&cookie),
        Some(json!({ "bookmarked": true })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(store.has_bookmark(user, doc.id));
    Ok(())
}

#[tokio::test]
async fn dashboard_requires_session() -> Result<(), String> {
    let store = InMemoryStore::new();
    let router = test_router(&store);

    let (status, _, _) = request(&router, Method::GET, "/me/dashboard", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = request(
        &router,
        Method::GET,
        "/me/dashboard",
        Some("session=does-not-exist"),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn dashboard_lists_reading_and_bookmarks() -> Result<(), String> {
    let store = InMemoryStore::new();
    let first = add(&store, "Rigveda", "Vedas");
    let second = add(&store, "Yoga Sutra", "Darshana");
    let (_, cookie) = signed_in(&store).await;
    let router = test_router(&store);

    for doc in [&first, &second] {
        let uri = format!("/documents/{}/start", doc.id);
        request(&router, Method::POST, &uri, Some(&cookie), None).await?;
    }
    let uri = format!("/documents/{}/bookmark", first.id);
    request(
        &router,
        Method::POST,
        &uri,
        Some(&cookie),
        Some(json!({ "bookmarked": false })),
    )
    .await?;

    let (status, body, _) =
        request(&router, Method::GET, "/me/dashboard", Some(&cookie), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reading"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["bookmarks"][0]["document"]["title"], "Rigveda");

    store.inject_failure("list_progress");
    let (status, body, _) =
        request(&router, Method::GET, "/me/dashboard", Some(&cookie), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reading"], json!([]));
    assert_eq!(body["bookmarks"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn signup_login_logout_round_trip() -> Result<(), String> {
    let store = InMemoryStore::new();
    let router = test_router(&store);
    let credentials = json!({ "email": "Reader@Example.org", "password": "om tat sat" });

    let (status, body, cookie) = request(
        &router,
        Method::POST,
        "/auth/signup",
        None,
        Some(credentials.clone()),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "reader@example.org");
    let cookie = cookie.ok_or("signup sets a cookie")?;
    assert!(cookie.contains(&format!("Max-Age={}", 30 * 24 * 60 * 60)));

    let (status, _, _) = request(
        &router,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "reader@example.org", "password": "wrong" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, login_cookie) =
        request(&router, Method::POST, "/auth/login", None, Some(credentials)).await?;
    assert_eq!(status, StatusCode::OK);
    let session = login_cookie
        .ok_or("login sets a cookie")?
        .split(';')
        .next()
        .map(str::to_owned)
        .ok_or("cookie pair")?;

    let (status, _, _) =
        request(&router, Method::GET, "/me/dashboard", Some(&session), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = request(&router, Method::POST, "/auth/logout", Some(&session), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) =
        request(&router, Method::GET, "/me/dashboard", Some(&session), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
