//! crates/reading_portal_core/src/filter.rs
//!
//! Bidirectional mapping between [`FilterState`] and the URL query string.
//!
//! The codec only touches the `search` and `category` parameters; anything else in
//! the query string is carried through untouched. Empty values are never written.

use url::form_urlencoded;

use crate::domain::{CategoryFilter, FilterState};

pub const SEARCH_PARAM: &str = "search";
pub const CATEGORY_PARAM: &str = "category";

/// An ordered list of URL query parameters with `URLSearchParams`-style editing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `a=1&b=2`, with or without a leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the first occurrence of `key` and drops any others; appends if absent.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(first) => {
                self.pairs[first].1 = value;
                let mut index = 0;
                self.pairs.retain(|(k, _)| {
                    let keep = k != key || index == first;
                    index += 1;
                    keep
                });
            }
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Serialises back to `a=1&b=2` (no leading `?`).
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.pairs {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Reads the filter out of the URL. Missing parameters default to an empty query
/// and "All"; an unrecognised category is also "All".
pub fn decode(params: &QueryParams) -> FilterState {
    let query = params.get(SEARCH_PARAM).unwrap_or_default().to_string();
    let category = params
        .get(CATEGORY_PARAM)
        .map_or(CategoryFilter::All, CategoryFilter::parse);
    FilterState { query, category }
}

/// Writes the filter into `params`, leaving unrelated parameters in place.
///
/// The query text is written verbatim; callers trim before submitting if they want to.
pub fn encode(state: &FilterState, params: &mut QueryParams) {
    if state.query.is_empty() {
        params.remove(SEARCH_PARAM);
    } else {
        params.set(SEARCH_PARAM, state.query.clone());
    }

    match state.category {
        CategoryFilter::All => params.remove(CATEGORY_PARAM),
        CategoryFilter::Only(category) => params.set(CATEGORY_PARAM, category.slug()),
    }
}

/// Encodes into a fresh parameter set.
pub fn to_params(state: &FilterState) -> QueryParams {
    let mut params = QueryParams::new();
    encode(state, &mut params);
    params
}
