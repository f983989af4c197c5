//! crates/reading_portal_core/src/domain.rs
//!
//! Defines the pure, core data structures for the reading portal.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Catalog
//=========================================================================================

/// The fixed set of catalog categories a reader can filter by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Vedas,
    Puranas,
    Itihasa,
    Darshana,
    Smriti,
    Shastra,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 6] = [
        Category::Vedas,
        Category::Puranas,
        Category::Itihasa,
        Category::Darshana,
        Category::Smriti,
        Category::Shastra,
    ];

    /// The display name, which is also how catalog rows spell the category.
    pub fn name(self) -> &'static str {
        match self {
            Category::Vedas => "Vedas",
            Category::Puranas => "Puranas",
            Category::Itihasa => "Itihasa",
            Category::Darshana => "Darshana",
            Category::Smriti => "Smriti",
            Category::Shastra => "Shastra",
        }
    }

    /// Lower-case slug used in URLs.
    pub fn slug(self) -> String {
        self.name().to_lowercase()
    }

    /// Case-insensitive lookup against the fixed set.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The category half of a filter: either one member of the fixed set or "All".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    /// Parses a user- or URL-supplied value. Anything unrecognised is "All".
    pub fn parse(value: &str) -> Self {
        Category::parse(value).map_or(CategoryFilter::All, CategoryFilter::Only)
    }

    pub fn category(self) -> Option<Category> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(category) => Some(category),
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("All"),
            CategoryFilter::Only(category) => category.fmt(f),
        }
    }
}

/// The in-memory search state of the library view.
///
/// The URL is canonical when a view is first opened; during interaction this
/// struct is canonical and is written back to the URL on every change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    pub query: String,
    pub category: CategoryFilter,
}

impl FilterState {
    pub fn new(query: impl Into<String>, category: CategoryFilter) -> Self {
        Self {
            query: query.into(),
            category,
        }
    }

    /// True when neither a text query nor a category narrows the catalog.
    pub fn is_unfiltered(&self) -> bool {
        self.query.is_empty() && self.category == CategoryFilter::All
    }

    /// Resets both halves of the filter.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// An immutable catalog record. Owned by the remote store; only ever read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub title_localized: Option<String>,
    pub description: Option<String>,
    pub description_localized: Option<String>,
    /// Free text: catalog rows may use categories outside the filterable set.
    pub category: String,
    pub subcategory: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub total_chapters: Option<i32>,
    pub total_verses: Option<i32>,
    pub featured: bool,
    /// Location of the readable file. `None` means the content is not yet available.
    pub content_url: Option<String>,
}

//=========================================================================================
// Per-user state
//=========================================================================================

/// A user's position in one document. At most one row per (user, document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub current_chapter: u32,
    pub current_verse: u32,
    pub progress_percentage: u8,
    pub last_read_at: DateTime<Utc>,
}

/// A saved document. Existence is keyed by (user, document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A progress row joined with its catalog record, for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEntry {
    pub progress: ReadingProgress,
    pub document: Document,
}

/// A bookmark joined with its catalog record, for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookmarkEntry {
    pub bookmark: Bookmark,
    pub document: Document,
}

//=========================================================================================
// Accounts
//=========================================================================================

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(Category::parse("vedas"), Some(Category::Vedas));
        assert_eq!(Category::parse("PURANAS"), Some(Category::Puranas));
        assert_eq!(Category::parse(" Smriti "), None);
        assert_eq!(Category::parse("Mantras"), None);
    }

    #[test]
    fn unknown_category_filter_fails_open() {
        assert_eq!(CategoryFilter::parse("upanishads"), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse(""), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::parse("itihasa"),
            CategoryFilter::Only(Category::Itihasa)
        );
    }

    #[test]
    fn clear_resets_filter() {
        let mut state = FilterState::new("gita", CategoryFilter::Only(Category::Smriti));
        assert!(!state.is_unfiltered());
        state.clear();
        assert!(state.is_unfiltered());
    }
}
