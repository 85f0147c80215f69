//! Headless browser rendering.
//!
//! ## Design
//!
//! A [`Renderer`] owns one browser process and hands out isolated
//! [`RenderContext`]s, one tab each. A context performs a complete
//! capture: navigate, let scripts run, scroll lazy sections into the
//! DOM, settle, then return the document. When no usable browser
//! exists the [`NoopRenderer`] stands in and fails every context
//! request, which the fetch layer converts into plain-HTTP operation.

pub mod chromium;

use anyhow::{bail, Result};
use async_trait::async_trait;

pub use chromium::ChromiumRenderer;

/// Knobs for a single page capture.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Hard ceiling on the initial navigation.
    pub nav_timeout_ms: u64,
    /// Wait after scrolling, sized for the slowest lazy galleries.
    pub settle_ms: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            nav_timeout_ms: 10_000,
            settle_ms: 1_000,
        }
    }
}

/// A fully rendered document.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Where the browser actually landed after redirects.
    pub final_url: String,
    pub html: String,
    pub load_time_ms: u64,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a fresh page context.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;

    /// Tear the browser down.
    async fn shutdown(&self) -> Result<()>;

    /// Number of contexts currently open.
    fn active_contexts(&self) -> usize;
}

#[async_trait]
pub trait RenderContext: Send {
    /// Drive `url` to a settled DOM and capture it.
    async fn capture(&mut self, url: &str, opts: &RenderOptions) -> Result<RenderedPage>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Stand-in renderer for hosts without a browser. Every context request
/// fails, so callers degrade to HTTP-only fetching.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        bail!("browser not available, running in HTTP-only mode")
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_renderer_refuses_contexts() {
        let renderer = NoopRenderer;
        assert!(renderer.new_context().await.is_err());
        assert_eq!(renderer.active_contexts(), 0);
        assert!(renderer.shutdown().await.is_ok());
    }
}
