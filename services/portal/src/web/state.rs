//! services/portal/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use reading_portal_core::ports::{AccountStore, RemoteStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RemoteStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub config: Arc<Config>,
}
