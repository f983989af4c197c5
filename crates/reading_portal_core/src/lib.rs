pub mod bookmark;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod filter;
pub mod identity;
pub mod memory;
pub mod pager;
pub mod ports;
pub mod progress;

pub use bookmark::{BookmarkState, BookmarkToggle};
pub use catalog::{CatalogQuery, CatalogResult};
pub use domain::{
    AuthSession, Bookmark, BookmarkEntry, Category, CategoryFilter, Document, FilterState,
    ProgressEntry, ReadingProgress, User, UserCredentials,
};
pub use error::{ErrorKind, PortalError};
pub use identity::{Identity, IdentityCell, IdentityProvider};
pub use pager::{PagerEvent, PagerState, PositionChange, ReaderPager, ReaderSession};
pub use ports::{AccountStore, FullscreenControl, PortError, PortResult, RemoteStore};
pub use progress::{ActiveDocument, ProgressTracker, ResumePoint};

/// Locks a std mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
