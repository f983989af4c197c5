//! crates/reading_portal_core/src/memory.rs
//!
//! An in-memory remote store that records every call.
//!
//! Used as the test double for the store ports and for running the portal without a
//! database. Supports injected failures per operation name and simulated latency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::catalog::CatalogQuery;
use crate::domain::{
    AuthSession, Bookmark, BookmarkEntry, Document, ProgressEntry, ReadingProgress, User,
    UserCredentials,
};
use crate::lock;
use crate::ports::{AccountStore, PortError, PortResult, RemoteStore};

/// Record of a store call, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    QueryDocuments,
    GetDocument { document_id: Uuid },
    FeaturedDocuments { limit: usize },
    GetProgress { user_id: Uuid, document_id: Uuid },
    UpsertProgress(ReadingProgress),
    ProgressPercentages { user_id: Uuid },
    ListProgress { user_id: Uuid },
    FindBookmark { user_id: Uuid, document_id: Uuid },
    InsertBookmark { user_id: Uuid, document_id: Uuid },
    DeleteBookmark { user_id: Uuid, document_id: Uuid },
    ListBookmarks { user_id: Uuid },
}

impl StoreOp {
    /// The operation name used by [`InMemoryStore::inject_failure`].
    pub fn name(&self) -> &'static str {
        match self {
            StoreOp::QueryDocuments => "query_documents",
            StoreOp::GetDocument { .. } => "get_document",
            StoreOp::FeaturedDocuments { .. } => "featured_documents",
            StoreOp::GetProgress { .. } => "get_progress",
            StoreOp::UpsertProgress(_) => "upsert_progress",
            StoreOp::ProgressPercentages { .. } => "progress_percentages",
            StoreOp::ListProgress { .. } => "list_progress",
            StoreOp::FindBookmark { .. } => "find_bookmark",
            StoreOp::InsertBookmark { .. } => "insert_bookmark",
            StoreOp::DeleteBookmark { .. } => "delete_bookmark",
            StoreOp::ListBookmarks { .. } => "list_bookmarks",
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    documents: Vec<Document>,
    progress: HashMap<(Uuid, Uuid), ReadingProgress>,
    bookmarks: HashMap<(Uuid, Uuid), Bookmark>,
    users: HashMap<String, UserCredentials>,
    sessions: HashMap<String, AuthSession>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    fail_ops: Arc<Mutex<Vec<String>>>,
    latency: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `latency` before touching the tables.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn add_document(&self, document: Document) {
        lock(&self.tables).documents.push(document);
    }

    /// All recorded calls, including ones that failed by injection.
    pub fn operations(&self) -> Vec<StoreOp> {
        lock(&self.operations).clone()
    }

    /// Recorded progress writes, in call order.
    pub fn progress_writes(&self) -> Vec<ReadingProgress> {
        lock(&self.operations)
            .iter()
            .filter_map(|op| match op {
                StoreOp::UpsertProgress(progress) => Some(progress.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_operations(&self) {
        lock(&self.operations).clear();
    }

    /// Makes every call named `operation` fail until cleared.
    pub fn inject_failure(&self, operation: impl Into<String>) {
        lock(&self.fail_ops).push(operation.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.fail_ops).clear();
    }

    /// Direct read of the stored progress row, bypassing the op log.
    pub fn stored_progress(&self, user_id: Uuid, document_id: Uuid) -> Option<ReadingProgress> {
        lock(&self.tables)
            .progress
            .get(&(user_id, document_id))
            .cloned()
    }

    pub fn has_bookmark(&self, user_id: Uuid, document_id: Uuid) -> bool {
        lock(&self.tables)
            .bookmarks
            .contains_key(&(user_id, document_id))
    }

    async fn begin(&self, op: StoreOp) -> PortResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let name = op.name();
        lock(&self.operations).push(op);
        if lock(&self.fail_ops).iter().any(|f| f == name) {
            return Err(PortError::Unexpected(format!(
                "Injected failure for operation: {name}"
            )));
        }
        Ok(())
    }

    fn join_document(tables: &Tables, document_id: Uuid) -> Option<Document> {
        tables.documents.iter().find(|d| d.id == document_id).cloned()
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn query_documents(&self, query: &CatalogQuery) -> PortResult<Vec<Document>> {
        self.begin(StoreOp::QueryDocuments).await?;
        Ok(query.apply(&lock(&self.tables).documents))
    }

    async fn get_document(&self, document_id: Uuid) -> PortResult<Option<Document>> {
        self.begin(StoreOp::GetDocument { document_id }).await?;
        Ok(Self::join_document(&lock(&self.tables), document_id))
    }

    async fn featured_documents(&self, limit: usize) -> PortResult<Vec<Document>> {
        self.begin(StoreOp::FeaturedDocuments { limit }).await?;
        Ok(lock(&self.tables)
            .documents
            .iter()
            .filter(|d| d.featured)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_progress(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<Option<ReadingProgress>> {
        self.begin(StoreOp::GetProgress {
            user_id,
            document_id,
        })
        .await?;
        Ok(self.stored_progress(user_id, document_id))
    }

    async fn upsert_progress(&self, progress: &ReadingProgress) -> PortResult<()> {
        self.begin(StoreOp::UpsertProgress(progress.clone())).await?;
        lock(&self.tables)
            .progress
            .insert((progress.user_id, progress.document_id), progress.clone());
        Ok(())
    }

    async fn progress_percentages(&self, user_id: Uuid) -> PortResult<Vec<(Uuid, u8)>> {
        self.begin(StoreOp::ProgressPercentages { user_id }).await?;
        Ok(lock(&self.tables)
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .map(|p| (p.document_id, p.progress_percentage))
            .collect())
    }

    async fn list_progress(&self, user_id: Uuid) -> PortResult<Vec<ProgressEntry>> {
        self.begin(StoreOp::ListProgress { user_id }).await?;
        let tables = lock(&self.tables);
        let mut entries: Vec<ProgressEntry> = tables
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| {
                Self::join_document(&tables, p.document_id).map(|document| ProgressEntry {
                    progress: p.clone(),
                    document,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.progress.last_read_at.cmp(&a.progress.last_read_at));
        Ok(entries)
    }

    async fn find_bookmark(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> PortResult<Option<Bookmark>> {
        self.begin(StoreOp::FindBookmark {
            user_id,
            document_id,
        })
        .await?;
        Ok(lock(&self.tables)
            .bookmarks
            .get(&(user_id, document_id))
            .cloned())
    }

    async fn insert_bookmark(&self, user_id: Uuid, document_id: Uuid) -> PortResult<Bookmark> {
        self.begin(StoreOp::InsertBookmark {
            user_id,
            document_id,
        })
        .await?;
        let mut tables = lock(&self.tables);
        if tables.bookmarks.contains_key(&(user_id, document_id)) {
            return Err(PortError::Unexpected(format!(
                "duplicate bookmark for user {user_id} and document {document_id}"
            )));
        }
        let bookmark = Bookmark {
            id: Uuid::new_v4(),
            user_id,
            document_id,
            created_at: Utc::now(),
        };
        tables
            .bookmarks
            .insert((user_id, document_id), bookmark.clone());
        Ok(bookmark)
    }

    async fn delete_bookmark(&self, user_id: Uuid, document_id: Uuid) -> PortResult<()> {
        self.begin(StoreOp::DeleteBookmark {
            user_id,
            document_id,
        })
        .await?;
        lock(&self.tables).bookmarks.remove(&(user_id, document_id));
        Ok(())
    }

    async fn list_bookmarks(&self, user_id: Uuid) -> PortResult<Vec<BookmarkEntry>> {
        self.begin(StoreOp::ListBookmarks { user_id }).await?;
        let tables = lock(&self.tables);
        let mut entries: Vec<BookmarkEntry> = tables
            .bookmarks
            .values()
            .filter(|b| b.user_id == user_id)
            .filter_map(|b| {
                Self::join_document(&tables, b.document_id).map(|document| BookmarkEntry {
                    bookmark: b.clone(),
                    document,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.bookmark.created_at.cmp(&a.bookmark.created_at));
        Ok(entries)
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut tables = lock(&self.tables);
        if tables.users.contains_key(email) {
            return Err(PortError::Unexpected(format!("email {email} already registered")));
        }
        let credentials = UserCredentials {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        let user = User {
            user_id: credentials.user_id,
            email: Some(credentials.email.clone()),
        };
        tables.users.insert(email.to_string(), credentials);
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        lock(&self.tables)
            .users
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {email} not found")))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        lock(&self.tables).sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let tables = lock(&self.tables);
        let session = tables
            .sessions
            .get(session_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {session_id} not found")))?;
        if session.expires_at <= Utc::now() {
            return Err(PortError::Unauthorized);
        }
        Ok(session.user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        lock(&self.tables).sessions.remove(session_id);
        Ok(())
    }
}

/// A minimal catalog record for fixtures.
pub fn sample_document(title: &str, category: &str) -> Document {
    Document {
        id: Uuid::new_v4(),
        title: title.to_string(),
        title_localized: None,
        description: None,
        description_localized: None,
        category: category.to_string(),
        subcategory: None,
        author: None,
        language: Some("Sanskrit".to_string()),
        total_chapters: None,
        total_verses: None,
        featured: false,
        content_url: Some(format!(
            "https://cdn.example.org/{}.pdf",
            title.to_lowercase().replace(' ', "-")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn injected_failure_is_recorded_and_returned() {
        let store = InMemoryStore::new();
        store.inject_failure("get_document");
        let id = Uuid::new_v4();

        assert!(store.get_document(id).await.is_err());
        assert_eq!(store.operations(), vec![StoreOp::GetDocument { document_id: id }]);

        store.clear_failures();
        assert_eq!(store.get_document(id).await, Ok(None));
    }

    #[tokio::test]
    async fn duplicate_bookmark_insert_is_rejected() {
        let store = InMemoryStore::new();
        let (user, doc) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert_bookmark(user, doc).await.expect("first insert");
        assert!(store.insert_bookmark(user, doc).await.is_err());
        assert!(store.has_bookmark(user, doc));
    }

    #[tokio::test]
    async fn expired_session_is_unauthorized() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store
            .create_auth_session("old", user, Utc::now() - chrono::Duration::minutes(1))
            .await
            .expect("create");
        assert_eq!(
            store.validate_auth_session("old").await,
            Err(PortError::Unauthorized)
        );
    }
}
