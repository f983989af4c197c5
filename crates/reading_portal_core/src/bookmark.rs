//! crates/reading_portal_core/src/bookmark.rs
//!
//! Adds or removes a bookmark for the signed-in user.
//!
//! The caller flips its displayed state only after the store confirms the change,
//! so a failure leaves the displayed state as it was and is reported back.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PortalError;
use crate::ports::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkState {
    Bookmarked,
    NotBookmarked,
}

impl BookmarkState {
    pub fn is_bookmarked(self) -> bool {
        self == BookmarkState::Bookmarked
    }
}

impl From<bool> for BookmarkState {
    fn from(bookmarked: bool) -> Self {
        if bookmarked {
            BookmarkState::Bookmarked
        } else {
            BookmarkState::NotBookmarked
        }
    }
}

#[derive(Clone)]
pub struct BookmarkToggle {
    store: Arc<dyn RemoteStore>,
}

impl BookmarkToggle {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Flips the bookmark for (user, document) and returns the confirmed new state.
    ///
    /// `current` must be what the caller last read from the store.
    pub async fn toggle(
        &self,
        user_id: Option<Uuid>,
        document_id: Uuid,
        current: BookmarkState,
    ) -> Result<BookmarkState, PortalError> {
        let user_id = user_id.ok_or(PortalError::Unauthenticated)?;

        let result = match current {
            BookmarkState::Bookmarked => self
                .store
                .delete_bookmark(user_id, document_id)
                .await
                .map(|()| BookmarkState::NotBookmarked),
            BookmarkState::NotBookmarked => self
                .store
                .insert_bookmark(user_id, document_id)
                .await
                .map(|_| BookmarkState::Bookmarked),
        };

        match result {
            Ok(state) => {
                info!(%user_id, %document_id, ?state, "Bookmark updated.");
                Ok(state)
            }
            Err(e) => {
                warn!(%user_id, %document_id, "Failed to update bookmark: {:?}", e);
                Err(PortalError::Remote(e.to_string()))
            }
        }
    }

    /// Existence check. A failed read is treated as "not bookmarked".
    pub async fn status(&self, user_id: Uuid, document_id: Uuid) -> BookmarkState {
        match self.store.find_bookmark(user_id, document_id).await {
            Ok(found) => BookmarkState::from(found.is_some()),
            Err(e) => {
                warn!(%user_id, %document_id, "Failed to read bookmark status: {:?}", e);
                BookmarkState::NotBookmarked
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryStore, StoreOp};

    fn toggle_for(store: &InMemoryStore) -> BookmarkToggle {
        BookmarkToggle::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn add_then_remove() {
        let store = InMemoryStore::new();
        let toggle = toggle_for(&store);
        let (user, doc) = (Uuid::new_v4(), Uuid::new_v4());

        let state = toggle
            .toggle(Some(user), doc, BookmarkState::NotBookmarked)
            .await
            .expect("add");
        assert_eq!(state, BookmarkState::Bookmarked);
        assert_eq!(toggle.status(user, doc).await, BookmarkState::Bookmarked);

        let state = toggle.toggle(Some(user), doc, state).await.expect("remove");
        assert_eq!(state, BookmarkState::NotBookmarked);
        assert_eq!(toggle.status(user, doc).await, BookmarkState::NotBookmarked);
        assert!(!store.has_bookmark(user, doc));
    }

    #[tokio::test]
    async fn anonymous_toggle_is_rejected_without_touching_the_store() {
        let store = InMemoryStore::new();
        let result = toggle_for(&store)
            .toggle(None, Uuid::new_v4(), BookmarkState::NotBookmarked)
            .await;
        assert_eq!(result, Err(PortalError::Unauthenticated));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn remote_failure_is_reported_and_state_kept() {
        let store = InMemoryStore::new();
        store.inject_failure("insert_bookmark");
        let (user, doc) = (Uuid::new_v4(), Uuid::new_v4());

        let result = toggle_for(&store)
            .toggle(Some(user), doc, BookmarkState::NotBookmarked)
            .await;
        assert!(matches!(result, Err(PortalError::Remote(_))));
        assert!(!store.has_bookmark(user, doc));
        assert_eq!(
            store.operations(),
            vec![StoreOp::InsertBookmark {
                user_id: user,
                document_id: doc
            }]
        );
    }

    #[tokio::test]
    async fn status_read_failure_degrades_to_not_bookmarked() {
        let store = InMemoryStore::new();
        let (user, doc) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert_bookmark(user, doc).await.expect("seed");
        store.inject_failure("find_bookmark");
        assert_eq!(
            toggle_for(&store).status(user, doc).await,
            BookmarkState::NotBookmarked
        );
    }
}
