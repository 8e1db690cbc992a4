use airwaves_cache::AudioCache;
use airwaves_core::{CatalogStore, Origin};
use airwaves_sync::{BatchRefresher, RefreshOptions};
use std::sync::Arc;

/// Shared services handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CatalogStore>,
    pub origin: Arc<dyn Origin>,
    pub cache: Arc<AudioCache>,
    pub refresher: Arc<BatchRefresher>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        origin: Arc<dyn Origin>,
        cache: Arc<AudioCache>,
        refresh: RefreshOptions,
    ) -> Self {
        let refresher = BatchRefresher::new(store.clone(), origin.clone(), cache.clone())
            .with_defaults(refresh);
        Self {
            store,
            origin,
            cache,
            refresher: Arc::new(refresher),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("origin", &self.origin.id())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
