//! crates/reading_portal_core/src/catalog.rs
//!
//! Turns a [`FilterState`] into a remote catalog query and runs it.
//!
//! A query is a conjunction of predicates: an optional case-insensitive category
//! equality and an optional OR of substring matches across the searchable fields.
//! Results are always ordered by title, ascending and stable.

use serde::Serialize;
use tracing::{debug, error};

use crate::domain::{Category, Document, FilterState};
use crate::error::{ErrorKind, PortalError};
use crate::ports::RemoteStore;

/// Catalog fields covered by free-text search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    TitleLocalized,
    Description,
    Author,
}

impl SearchField {
    pub const ALL: [SearchField; 4] = [
        SearchField::Title,
        SearchField::TitleLocalized,
        SearchField::Description,
        SearchField::Author,
    ];

    /// Column name in the `scriptures` table.
    pub fn column(self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::TitleLocalized => "title_hindi",
            SearchField::Description => "description",
            SearchField::Author => "author",
        }
    }

    fn value(self, document: &Document) -> Option<&str> {
        match self {
            SearchField::Title => Some(document.title.as_str()),
            SearchField::TitleLocalized => document.title_localized.as_deref(),
            SearchField::Description => document.description.as_deref(),
            SearchField::Author => document.author.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Case-insensitive equality on the category column.
    CategoryEquals(Category),
    /// True when any of `fields` contains `needle`, ignoring case.
    AnyContains {
        fields: Vec<SearchField>,
        needle: String,
    },
}

impl Predicate {
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Predicate::CategoryEquals(category) => {
                document.category.eq_ignore_ascii_case(category.name())
            }
            Predicate::AnyContains { fields, needle } => {
                let needle = needle.to_lowercase();
                fields.iter().any(|field| {
                    field
                        .value(document)
                        .is_some_and(|value| value.to_lowercase().contains(&needle))
                })
            }
        }
    }
}

/// A catalog query ready to hand to a [`RemoteStore`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogQuery {
    pub predicates: Vec<Predicate>,
}

impl CatalogQuery {
    pub fn build(state: &FilterState) -> Self {
        let mut predicates = Vec::new();

        if let Some(category) = state.category.category() {
            predicates.push(Predicate::CategoryEquals(category));
        }

        if !state.query.is_empty() {
            predicates.push(Predicate::AnyContains {
                fields: SearchField::ALL.to_vec(),
                needle: state.query.clone(),
            });
        }

        Self { predicates }
    }

    pub fn category_predicate(&self) -> Option<Category> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::CategoryEquals(category) => Some(*category),
            _ => None,
        })
    }

    pub fn text_predicate(&self) -> Option<(&[SearchField], &str)> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::AnyContains { fields, needle } => Some((fields.as_slice(), needle.as_str())),
            _ => None,
        })
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.predicates.iter().all(|p| p.matches(document))
    }

    /// Evaluates the query over an in-memory slice, with the remote ordering.
    pub fn apply<'a, I>(&self, documents: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut hits: Vec<Document> = documents
            .into_iter()
            .filter(|d| self.matches(d))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.title.cmp(&b.title));
        hits
    }
}

/// Outcome of a catalog query. Keeps "zero matches" distinct from "query failed".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CatalogResult {
    Ok { documents: Vec<Document> },
    Error { kind: ErrorKind },
}

impl CatalogResult {
    /// The documents, or an empty slice when the query failed.
    pub fn documents(&self) -> &[Document] {
        match self {
            CatalogResult::Ok { documents } => documents,
            CatalogResult::Error { .. } => &[],
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CatalogResult::Error { .. })
    }
}

/// Runs `query` against the store. Read-only.
pub async fn execute(store: &dyn RemoteStore, query: &CatalogQuery) -> CatalogResult {
    match store.query_documents(query).await {
        Ok(documents) => {
            debug!(count = documents.len(), "Catalog query returned.");
            CatalogResult::Ok { documents }
        }
        Err(e) => {
            error!("Catalog query failed: {:?}", e);
            CatalogResult::Error {
                kind: PortalError::from(e).kind(),
            }
        }
    }
}
