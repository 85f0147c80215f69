//! Run the Vitrin server.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::crawl::Crawler;
use crate::enhance::{Enhancer, HttpRewriter, NoopRewriter, Rewriter};
use crate::fetch::{BrowserFetcher, FetchConfig, HttpFetcher, PageFetcher};
use crate::renderer::{ChromiumRenderer, Renderer};
use crate::server::AppState;
use crate::store::{transient_ttl_secs, FileStore, MemoryStore, ProductStore};
use crate::{maintenance, rest};

/// Start the REST server with store, fetcher and enhancer wired from
/// the environment.
pub async fn run(port: u16) -> Result<()> {
    super::init_tracing();

    info!("starting Vitrin v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store().context("failed to open product store")?;
    let http = HttpFetcher::new(&FetchConfig::from_env())?;

    let (fetcher, renderer): (Arc<dyn PageFetcher>, Option<Arc<dyn Renderer>>) =
        match ChromiumRenderer::new().await {
            Ok(r) => {
                info!("Chromium renderer initialized");
                let renderer: Arc<dyn Renderer> = Arc::new(r);
                (
                    Arc::new(BrowserFetcher::new(Arc::clone(&renderer), http)),
                    Some(renderer),
                )
            }
            Err(e) => {
                warn!("failed to initialize Chromium: {e}");
                warn!("running in HTTP-only mode");
                (Arc::new(http), None)
            }
        };

    let crawler = Crawler::new(Arc::clone(&fetcher), Arc::clone(&store));

    let rewriter: Arc<dyn Rewriter> = match HttpRewriter::from_env() {
        Some(r) => {
            info!("description rewrite backend configured");
            Arc::new(r)
        }
        None => {
            info!("no rewrite API key set, descriptions stay template-based");
            Arc::new(NoopRewriter)
        }
    };
    let enhancer = Enhancer::new(rewriter);

    let state = AppState::new(store, crawler, enhancer, renderer.clone());
    let shutdown = state.shutdown_handle();

    // SIGINT stops the REST server and the maintenance loop together.
    let signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        signal.notify_waiters();
    });

    let sweeper = maintenance::spawn(Arc::clone(&state), Arc::clone(&shutdown));

    eprintln!(
        "  Vitrin v{} serving on http://127.0.0.1:{port}",
        env!("CARGO_PKG_VERSION")
    );

    let result = rest::start(port, Arc::clone(&state)).await;

    shutdown.notify_waiters();
    let _ = sweeper.await;
    if let Some(renderer) = renderer {
        let _ = renderer.shutdown().await;
    }

    eprintln!("  Vitrin stopped.");
    result
}

/// Pick the store backend from `VITRIN_STORE` (memory unless "file").
fn build_store() -> Result<Arc<dyn ProductStore>> {
    let ttl = transient_ttl_secs();
    let kind = std::env::var("VITRIN_STORE").unwrap_or_else(|_| "memory".to_string());

    match kind.trim().to_ascii_lowercase().as_str() {
        "file" => {
            let dir = FileStore::default_dir();
            let store = FileStore::open(&dir, ttl)?;
            info!("file store open at {}", dir.display());
            Ok(Arc::new(store))
        }
        _ => {
            info!("using in-memory store");
            Ok(Arc::new(MemoryStore::new(ttl)))
        }
    }
}
