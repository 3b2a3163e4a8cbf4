//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use classification_core::ports::DatabaseService;
use classification_core::Catalog;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, config: Arc<Config>) -> Self {
        Self {
            catalog: Catalog::new(db.clone()),
            db,
            config,
        }
    }
}
