//! Crawl orchestration: fetch, extract, resolve, persist.

pub mod variants;

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::CrawlError;
use crate::extract;
use crate::fetch::PageFetcher;
use crate::model::Product;
use crate::store::{ProductStore, Retention};
use variants::VariantResolution;

pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn ProductStore>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, store: Arc<dyn ProductStore>) -> Self {
        Self { fetcher, store }
    }

    /// Crawl a product page into its flattened variant records.
    ///
    /// The returned list is the sellable set in color-major order. The
    /// root record and every linked color base are stored alongside it
    /// as transient entries, so `parent_sku` references always resolve
    /// against the store.
    pub async fn crawl(&self, url: &str) -> Result<Vec<Product>, CrawlError> {
        let crawl_id = Uuid::new_v4();
        info!(%crawl_id, url, "starting product crawl");

        let page = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| CrawlError::fetch(url, format!("{e:#}")))?;

        let html = page.html;
        let final_url = page.final_url;

        let mut base = {
            let html = html.clone();
            let page_url = final_url.clone();
            tokio::task::spawn_blocking(move || extract::extract_product(&html, &page_url))
                .await
                .map_err(|e| CrawlError::fetch(url, format!("extraction task failed: {e}")))??
        };
        base.is_main_variant = true;

        let VariantResolution {
            mut root,
            linked_bases,
            products,
        } = variants::resolve(Arc::clone(&self.fetcher), &final_url, html, base).await;

        // A page without variants resolves to just itself; the root
        // must not nest its own record then.
        let self_only = products.len() == 1 && products[0].sku == root.sku;
        if !self_only {
            root.variants = products.clone();
        }
        let root_sku = root.sku.clone();

        self.store.set(root, Retention::Transient).await?;
        for color_base in linked_bases {
            self.store.set(color_base, Retention::Transient).await?;
        }
        for product in &products {
            if product.sku != root_sku {
                self.store.set(product.clone(), Retention::Transient).await?;
            }
        }

        info!(%crawl_id, products = products.len(), "crawl complete");
        Ok(products)
    }
}
