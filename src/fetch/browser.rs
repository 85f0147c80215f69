//! Browser-backed fetching with HTTP fallback.
//!
//! Product galleries and lazy sections only materialize after scripts
//! run and the page has been scrolled, so the primary path captures
//! each page through a headless browser context. Any failure falls
//! back to the plain HTTP fetcher; a crawl never dies because the
//! browser did.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{FetchedPage, HttpFetcher, PageFetcher};
use crate::renderer::{RenderOptions, Renderer};

pub struct BrowserFetcher {
    renderer: Arc<dyn Renderer>,
    fallback: HttpFetcher,
}

impl BrowserFetcher {
    pub fn new(renderer: Arc<dyn Renderer>, fallback: HttpFetcher) -> Self {
        Self { renderer, fallback }
    }

    async fn render(&self, url: &str) -> Result<FetchedPage> {
        let mut ctx = self.renderer.new_context().await?;
        let captured = ctx.capture(url, &RenderOptions::default()).await;
        if let Err(e) = ctx.close().await {
            debug!("render context close failed: {e}");
        }

        let page = captured?;
        debug!("rendered {url} in {}ms", page.load_time_ms);
        Ok(FetchedPage {
            url: url.to_string(),
            final_url: page.final_url,
            html: page.html,
            // The DevTools path does not surface the HTTP status; a
            // page that rendered is treated as served.
            status: 200,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        match self.render(url).await {
            Ok(page) => Ok(page),
            Err(e) => {
                warn!("browser render of {url} failed ({e:#}), falling back to HTTP");
                self.fallback.fetch(url).await
            }
        }
    }
}
