//! Chromium-backed rendering over the DevTools protocol.
//!
//! One headless browser process serves the whole crawl; each capture
//! runs in its own short-lived tab so state never bleeds between
//! product pages.

use super::{RenderContext, RenderOptions, RenderedPage, Renderer};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Pulls below-the-fold galleries and review widgets into the DOM.
const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Locate a Chromium binary: explicit override first, then whatever the
/// PATH offers, then the stock macOS install.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(overridden) = std::env::var("VITRIN_CHROMIUM_PATH") {
        return Some(PathBuf::from(overridden)).filter(|p| p.exists());
    }

    let on_path = [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
    ]
    .into_iter()
    .find_map(|bin| which::which(bin).ok());
    if on_path.is_some() {
        return on_path;
    }

    #[cfg(target_os = "macos")]
    {
        let stock =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if stock.exists() {
            return Some(stock);
        }
    }

    None
}

/// Renderer backed by a single headless Chromium process.
pub struct ChromiumRenderer {
    browser: Browser,
    open_tabs: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch headless Chromium sized like a desktop session, so product
    /// pages serve their full gallery markup rather than mobile layouts.
    pub async fn new() -> Result<Self> {
        let binary = find_chromium()
            .context("no Chromium binary found; set VITRIN_CHROMIUM_PATH or install a browser")?;
        debug!("using chromium at {}", binary.display());

        let config = BrowserConfig::builder()
            .chrome_executable(binary)
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--window-size=1920,1080")
            .build()
            .map_err(|e| anyhow!("browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // The CDP event stream must be drained or the browser stalls.
        tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Self {
            browser,
            open_tabs: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to open a browser tab")?;
        self.open_tabs.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumTab {
            page,
            open_tabs: Arc::clone(&self.open_tabs),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Dropping the Browser handle reaps the child process.
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.open_tabs.load(Ordering::Relaxed)
    }
}

/// One tab, driven through a full capture and then closed.
struct ChromiumTab {
    page: Page,
    open_tabs: Arc<AtomicUsize>,
}

impl ChromiumTab {
    /// Best-effort landing URL; storefronts redirect freely between
    /// slug variants and the crawl records where the page ended up.
    async fn landed_url(&self, requested: &str) -> String {
        match self.page.url().await {
            Ok(Some(current)) => current,
            _ => requested.to_string(),
        }
    }
}

#[async_trait]
impl RenderContext for ChromiumTab {
    async fn capture(&mut self, url: &str, opts: &RenderOptions) -> Result<RenderedPage> {
        let started = Instant::now();

        let deadline = Duration::from_millis(opts.nav_timeout_ms);
        match tokio::time::timeout(deadline, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!(
                "navigation to {url} timed out after {}ms",
                opts.nav_timeout_ms
            ),
        }
        let _ = self.page.wait_for_navigation().await;

        if let Err(e) = self.page.evaluate(SCROLL_TO_BOTTOM).await {
            debug!("scroll on {url} failed: {e}");
        }
        tokio::time::sleep(Duration::from_millis(opts.settle_ms)).await;

        let html = self.page.content().await.context("DOM capture failed")?;

        Ok(RenderedPage {
            final_url: self.landed_url(url).await,
            html,
            load_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.open_tabs.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a Chromium binary on the host.
    #[tokio::test]
    #[ignore]
    async fn captures_a_settled_dom() {
        let renderer = ChromiumRenderer::new().await.expect("launch failed");
        let mut tab = renderer.new_context().await.expect("no tab");
        assert_eq!(renderer.active_contexts(), 1);

        let page = tab
            .capture(
                "data:text/html,<h1 class=\"pr-new-br\">Acme Tee</h1>",
                &RenderOptions {
                    nav_timeout_ms: 10_000,
                    settle_ms: 50,
                },
            )
            .await
            .expect("capture failed");
        assert!(page.html.contains("Acme Tee"));
        assert!(page.load_time_ms < 10_000);

        tab.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);
        renderer.shutdown().await.expect("shutdown failed");
    }
}
