//! Page acquisition: rendered documents behind one trait.

pub mod browser;
pub mod http;

use anyhow::Result;
use async_trait::async_trait;

pub use browser::BrowserFetcher;
pub use http::{FetchConfig, HttpFetcher};

/// A fetched, rendered product page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL as requested.
    pub url: String,
    /// URL after redirects; SKU derivation uses this one.
    pub final_url: String,
    pub html: String,
    pub status: u16,
}

/// Source of rendered documents.
///
/// The crawl pipeline only ever sees the HTML string; whether it came
/// from a plain GET or a scrolled headless-browser session is the
/// fetcher's concern.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}
