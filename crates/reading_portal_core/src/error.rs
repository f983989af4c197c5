//! crates/reading_portal_core/src/error.rs
//!
//! The error kinds surfaced by the synchronization layer to its callers.

use serde::Serialize;

use crate::ports::PortError;

/// Errors reported by catalog, bookmark, and reader operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortalError {
    /// A query, read, or write against the remote store failed.
    #[error("Remote store error: {0}")]
    Remote(String),

    /// A write was attempted with no signed-in user.
    #[error("Sign in required")]
    Unauthenticated,

    /// The requested document has no catalog record.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The document content is unavailable or could not be loaded.
    #[error("Unable to render document: {0}")]
    RenderFailure(String),
}

/// Payload-free discriminant of [`PortalError`], for tagged results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Remote,
    Unauthenticated,
    NotFound,
    RenderFailure,
}

impl PortalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortalError::Remote(_) => ErrorKind::Remote,
            PortalError::Unauthenticated => ErrorKind::Unauthenticated,
            PortalError::NotFound(_) => ErrorKind::NotFound,
            PortalError::RenderFailure(_) => ErrorKind::RenderFailure,
        }
    }
}

impl From<PortError> for PortalError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => PortalError::NotFound(what),
            PortError::Unauthorized => PortalError::Unauthenticated,
            PortError::Unexpected(message) => PortalError::Remote(message),
        }
    }
}
