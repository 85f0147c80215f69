// Copyright 2026 Vitrin Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for Vitrin.
//!
//! A thin CRUD surface over the crawl pipeline and product store. Every
//! handler borrows the shared [`AppState`] and returns either typed
//! JSON or an [`ApiError`] envelope with a matching status code.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::error::{CrawlError, StoreError};
use crate::model::{Product, ProductVariants};
use crate::server::AppState;
use crate::store::Retention;

/// REST-facing error with an HTTP status mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        }
        let body = Json(serde_json::json!({
            "error": { "code": self.code(), "message": self.to_string() }
        }));
        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match &e {
            StoreError::NotFound { .. } => Self::NotFound(e.to_string()),
            StoreError::WriteFailure { .. } => Self::Internal(e.to_string()),
        }
    }
}

impl From<CrawlError> for ApiError {
    fn from(e: CrawlError) -> Self {
        match &e {
            // The page answered but held no product data.
            CrawlError::MissingRequiredField { .. } => Self::NotFound(e.to_string()),
            CrawlError::Store(StoreError::NotFound { .. }) => Self::NotFound(e.to_string()),
            _ => Self::Internal(e.to_string()),
        }
    }
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/products", post(save_product).get(list_products))
        .route("/products/crawl", post(crawl_products))
        .route("/products/transform/:sku", post(transform_product))
        .route("/products/:sku", get(get_product))
        .route("/products/:sku/variants", get(get_product_variants))
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server on the given port.
///
/// Runs until the state's shutdown notifier fires.
pub async fn start(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let shutdown = state.shutdown_handle();
    let app = router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await?;
    info!("server stopped");
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime_s = state.started_at.elapsed().as_secs_f64();
    let products_stored = state
        .store
        .list_by_prefix("")
        .await
        .map(|p| p.len())
        .unwrap_or(0);
    let active_contexts = state
        .renderer
        .as_ref()
        .map(|r| r.active_contexts())
        .unwrap_or(0);

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": uptime_s,
        "productsStored": products_stored,
        "browserAvailable": state.renderer.is_some(),
        "activeContexts": active_contexts,
    }))
}

/// `POST /products/crawl` — crawl a page into its flattened variants.
async fn crawl_products(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Vec<Product>>> {
    let url = body
        .get("url")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or_default();
    if url.is_empty() {
        return Err(ApiError::bad_request("missing or empty 'url'"));
    }

    let products = state.crawler.crawl(url).await?;
    if products.is_empty() {
        return Err(ApiError::not_found(format!("no products found at {url}")));
    }
    Ok(Json(products))
}

/// `POST /products/transform/{sku}` — enhance a stored product and
/// store the result back under its existing retention.
async fn transform_product(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
) -> ApiResult<Json<Product>> {
    let product = state.store.get(&sku).await?;
    let retention = if product.is_saved {
        Retention::Saved
    } else {
        Retention::Transient
    };

    let enhanced = state.enhancer.enhance(product).await;
    let stored = state.store.set(enhanced, retention).await?;
    Ok(Json(stored))
}

/// `POST /products` — persist a product with long retention.
async fn save_product(
    State(state): State<Arc<AppState>>,
    Json(product): Json<Product>,
) -> ApiResult<Json<Product>> {
    if product.sku.trim().is_empty() {
        return Err(ApiError::bad_request("product is missing a 'sku'"));
    }
    let stored = state.store.set(product, Retention::Saved).await?;
    Ok(Json(stored))
}

/// `GET /products` — saved products, best score first, unscored last.
async fn list_products(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Product>>> {
    let mut products: Vec<Product> = state
        .store
        .list_by_prefix("")
        .await?
        .into_iter()
        .filter(|p| p.is_saved)
        .collect();

    products.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    Ok(Json(products))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.store.get(&sku).await?))
}

/// `GET /products/{sku}/variants` — color/size summary of a stored
/// record's variant tree.
async fn get_product_variants(
    State(state): State<Arc<AppState>>,
    Path(sku): Path<String>,
) -> ApiResult<Json<ProductVariants>> {
    let product = state.store.get(&sku).await?;
    Ok(Json(ProductVariants::from_product(&product)))
}
