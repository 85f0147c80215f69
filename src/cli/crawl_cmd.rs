//! `vitrin crawl <url>` — one-shot crawl printing the resolved tree.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::crawl::Crawler;
use crate::fetch::{BrowserFetcher, FetchConfig, HttpFetcher, PageFetcher};
use crate::renderer::{ChromiumRenderer, Renderer};
use crate::store::{transient_ttl_secs, MemoryStore, ProductStore};

/// Run the crawl command: fetch, resolve variants, print JSON.
pub async fn run(url: &str) -> Result<()> {
    super::init_tracing();

    let store: Arc<dyn ProductStore> = Arc::new(MemoryStore::new(transient_ttl_secs()));
    let http = HttpFetcher::new(&FetchConfig::from_env())?;

    let (fetcher, renderer): (Arc<dyn PageFetcher>, Option<Arc<dyn Renderer>>) =
        match ChromiumRenderer::new().await {
            Ok(r) => {
                let renderer: Arc<dyn Renderer> = Arc::new(r);
                (
                    Arc::new(BrowserFetcher::new(Arc::clone(&renderer), http)),
                    Some(renderer),
                )
            }
            Err(e) => {
                warn!("no browser available ({e}), crawling over plain HTTP");
                (Arc::new(http), None)
            }
        };

    let crawler = Crawler::new(fetcher, Arc::clone(&store));
    let products = crawler.crawl(url).await?;
    info!("crawled {} product(s) from {url}", products.len());

    // The root record carries the nested variant tree; fall back to the
    // flattened list if it somehow is not there.
    let root = store
        .list_by_prefix("")
        .await?
        .into_iter()
        .find(|p| p.is_main_variant);
    let output = match root {
        Some(root) => serde_json::to_string_pretty(&root)?,
        None => serde_json::to_string_pretty(&products)?,
    };
    println!("{output}");

    if let Some(renderer) = renderer {
        let _ = renderer.shutdown().await;
    }
    Ok(())
}
