//! Shared handler state.

use catalog_db::CatalogService;

/// State cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    /// Name of the storage strategy, reported by `/health`.
    pub backend: &'static str,
}

impl AppState {
    pub fn new(catalog: CatalogService, backend: &'static str) -> Self {
        AppState { catalog, backend }
    }
}
