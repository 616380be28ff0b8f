//! Application context shared with every route handler through Axum state.
//!
//! The context owns the resolution cache and the in-flight slot table (both
//! inside the [`Coordinator`]), the upstream media client, and the catalog
//! client. Everything is behind `Arc`, so cloning is cheap.

use std::sync::Arc;

use yb_core::config::Config;
use yb_core::Result;
use yb_resolver::Resolver;

use crate::cache::ResolutionCache;
use crate::catalog::CatalogClient;
use crate::coordinator::Coordinator;
use crate::proxy::Proxy;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub coordinator: Arc<Coordinator>,
    pub proxy: Arc<Proxy>,
    pub catalog: Arc<CatalogClient>,
}

impl AppContext {
    /// Assemble a context around an already-built resolver.
    pub fn new(config: Config, resolver: Arc<dyn Resolver>) -> Result<Self> {
        let cache = Arc::new(ResolutionCache::new());
        let coordinator = Arc::new(Coordinator::new(resolver, cache));
        let proxy = Arc::new(Proxy::from_config(&config.playback)?);
        let catalog = Arc::new(CatalogClient::from_config(&config.catalog)?);

        Ok(Self {
            config: Arc::new(config),
            coordinator,
            proxy,
            catalog,
        })
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        self.coordinator.cache()
    }
}
