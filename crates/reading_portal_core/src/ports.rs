//! crates/reading_portal_core/src/ports.rs
//!
//! Defines the service contracts (traits) the synchronization layer consumes.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the concrete remote store, account backend, and platform.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::CatalogQuery;
use crate::domain::{
    Bookmark, BookmarkEntry, Document, ProgressEntry, ReadingProgress, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote data store: catalog reads plus the per-user progress and bookmark tables.
///
/// Every call either returns a payload or a tagged error. Retry and timeout policy
/// belongs to the implementation.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // --- Catalog ---
    /// Runs a filtered catalog query, ordered as the query requests.
    async fn query_documents(&self, query: &CatalogQuery) -> PortResult<Vec<Document>>;

    /// Point read of one catalog record. A missing record is `Ok(None)`.
    async fn get_document(&self, document_id: Uuid) -> PortResult<Option<Document>>;

    async fn featured_documents(&self, limit: usize) -> PortResult<Vec<Document>>;

    // --- Reading progress ---
    async fn get_progress(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<Option<ReadingProgress>>;

    /// Insert-or-overwrite keyed on (user_id, document_id).
    async fn upsert_progress(&self, progress: &ReadingProgress) -> PortResult<()>;

    /// `(document_id, percentage)` for every document the user has started.
    async fn progress_percentages(&self, user_id: Uuid) -> PortResult<Vec<(Uuid, u8)>>;

    /// Progress rows with their documents, most recently read first.
    async fn list_progress(&self, user_id: Uuid) -> PortResult<Vec<ProgressEntry>>;

    // --- Bookmarks ---
    async fn find_bookmark(&self, user_id: Uuid, document_id: Uuid)
        -> PortResult<Option<Bookmark>>;

    async fn insert_bookmark(&self, user_id: Uuid, document_id: Uuid) -> PortResult<Bookmark>;

    async fn delete_bookmark(&self, user_id: Uuid, document_id: Uuid) -> PortResult<()>;

    /// Bookmarks with their documents, newest first.
    async fn list_bookmarks(&self, user_id: Uuid) -> PortResult<Vec<BookmarkEntry>>;
}

/// Accounts and browser sessions backing the identity provider.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning user of a live session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// The platform's fullscreen request. Failure to enter is never fatal.
pub trait FullscreenControl: Send + Sync {
    fn request(&self, enter: bool) -> PortResult<()>;
}
