//! Plain HTTP page acquisition with retry and backoff.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::{FetchedPage, PageFetcher};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MAX_REDIRECTS: usize = 5;
const MAX_RETRIES: u32 = 2;
const RETRY_BASE_MS: u64 = 500;
const MAX_RETRY_AFTER_SECS: u64 = 10;
const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Fetch tuning, environment-driven.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    /// Read overrides from `VITRIN_FETCH_TIMEOUT_MS` and
    /// `VITRIN_USER_AGENT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("VITRIN_FETCH_TIMEOUT_MS") {
            if let Ok(n) = v.parse::<u64>() {
                config.timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("VITRIN_USER_AGENT") {
            if !v.is_empty() {
                config.user_agent = v;
            }
        }
        config
    }
}

/// HTTP fetcher with a desktop-browser profile.
///
/// Transport errors and 5xx answers are retried up to [`MAX_RETRIES`]
/// times with exponential backoff; a 429 waits out `Retry-After`
/// (capped). Other non-success statuses fail immediately, retrying a
/// 404 never helps. Protocol-level failures get one more pass over an
/// HTTP/1.1-only client, some CDNs reject HTTP/2.
pub struct HttpFetcher {
    client: reqwest::Client,
    h1_client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let builder = || {
            reqwest::Client::builder()
                .user_agent(&config.user_agent)
                .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
                .timeout(Duration::from_millis(config.timeout_ms))
        };
        let client = builder().build().context("failed to build HTTP client")?;
        let h1_client = builder()
            .http1_only()
            .build()
            .context("failed to build HTTP/1.1 client")?;
        Ok(Self { client, h1_client })
    }

    async fn get(&self, url: &str) -> Result<FetchedPage> {
        match self.get_with(&self.client, url).await {
            Ok(page) => Ok(page),
            Err(e) => {
                let reason = format!("{e}");
                if reason.contains("http2")
                    || reason.contains("protocol")
                    || reason.contains("connection closed")
                {
                    debug!("retrying {url} over HTTP/1.1 after protocol error");
                    self.get_with(&self.h1_client, url).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn get_with(&self, client: &reqwest::Client, url: &str) -> Result<FetchedPage> {
        let mut last_error: Option<String> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(RETRY_BASE_MS * 2u64.pow(attempt - 1));
                debug!("retrying {url} in {delay:?} (attempt {attempt})");
                tokio::time::sleep(delay).await;
            }

            let response = match client.get(url).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!("transport error fetching {url}: {e}");
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                let wait = retry_after_secs(&response).min(MAX_RETRY_AFTER_SECS);
                warn!("rate limited on {url}, honoring Retry-After of {wait}s");
                last_error = Some("rate limited (429)".to_string());
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if status.is_server_error() {
                warn!("server error {status} fetching {url}");
                last_error = Some(format!("server error {status}"));
                continue;
            }

            if !status.is_success() {
                bail!("{url} answered {status}");
            }

            let final_url = response.url().to_string();
            let html = response
                .text()
                .await
                .context("failed to read response body")?;
            return Ok(FetchedPage {
                url: url.to_string(),
                final_url,
                html,
                status: status.as_u16(),
            });
        }

        bail!(
            "giving up on {url} after {MAX_RETRIES} retries: {}",
            last_error.unwrap_or_else(|| "no response".to_string())
        )
    }
}

fn retry_after_secs(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(1)
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.get(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&FetchConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn returns_body_and_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/acme/tee-p-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let page = fetcher()
            .fetch(&format!("{}/acme/tee-p-1", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.html, "<html>ok</html>");
        assert!(page.final_url.ends_with("/acme/tee-p-1"));
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let page = fetcher().fetch(&server.uri()).await.unwrap();
        assert_eq!(page.html, "recovered");
    }

    #[tokio::test]
    async fn client_errors_fail_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher().fetch(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = fetcher().fetch(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("giving up"));
    }
}
