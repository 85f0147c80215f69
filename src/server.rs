//! Shared runtime state behind the REST API and maintenance loop.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

use crate::crawl::Crawler;
use crate::enhance::Enhancer;
use crate::renderer::Renderer;
use crate::store::ProductStore;

/// Everything the HTTP handlers and the maintenance loop share.
pub struct AppState {
    pub started_at: Instant,
    pub store: Arc<dyn ProductStore>,
    pub crawler: Crawler,
    pub enhancer: Enhancer,
    /// Present only when a usable browser was found at startup.
    pub renderer: Option<Arc<dyn Renderer>>,
    shutdown: Arc<Notify>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ProductStore>,
        crawler: Crawler,
        enhancer: Enhancer,
        renderer: Option<Arc<dyn Renderer>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            started_at: Instant::now(),
            store,
            crawler,
            enhancer,
            renderer,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Get the shutdown notifier (for external shutdown signaling).
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }
}
