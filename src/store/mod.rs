//! SKU-keyed product persistence.
//!
//! Two implementations share one contract: an in-memory store for
//! single-process deployments and tests, and a file-backed store that
//! rewrites one JSON array wholesale on every change. A deployment runs
//! exactly one of them; nothing mirrors writes across stores.
//!
//! Crawled records enter as [`Retention::Transient`] and live until the
//! maintenance sweep; saving through the API upgrades them to
//! [`Retention::Saved`], which is never auto-evicted.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::model::Product;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Default lifetime of transient records.
pub const DEFAULT_TRANSIENT_TTL_SECS: u64 = 1800;

/// TTL for transient records, overridable via
/// `VITRIN_TRANSIENT_TTL_SECS`.
pub fn transient_ttl_secs() -> u64 {
    std::env::var("VITRIN_TRANSIENT_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TRANSIENT_TTL_SECS)
}

/// Retention class for stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Crawl output awaiting confirmation; evictable once stale.
    Transient,
    /// Explicitly saved through the API; never auto-evicted.
    Saved,
}

/// A stored record with its bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct StoredEntry {
    pub product: Product,
    pub retention: Retention,
    pub stored_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn new(product: Product, retention: Retention) -> Self {
        Self {
            product,
            retention,
            stored_at: Utc::now(),
        }
    }

    /// Transient entries expire; saved ones never do.
    pub fn is_expired(&self, ttl_secs: u64) -> bool {
        self.retention == Retention::Transient
            && (Utc::now() - self.stored_at).num_seconds() >= ttl_secs as i64
    }
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Fetch one product by SKU.
    async fn get(&self, sku: &str) -> Result<Product, StoreError>;

    /// Insert or replace the record under `product.sku`. Returns the
    /// stored product, its `is_saved` flag forced to match retention.
    async fn set(&self, product: Product, retention: Retention) -> Result<Product, StoreError>;

    /// All products whose SKU starts with `prefix`, ordered by SKU.
    /// The empty prefix lists everything.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<Product>, StoreError>;

    /// Remove one record. Missing SKUs are an error.
    async fn remove(&self, sku: &str) -> Result<(), StoreError>;

    /// Drop expired transient records. Returns how many went away.
    async fn evict_expired(&self) -> usize;
}

/// Per-SKU mutex registry.
///
/// Serializes read-modify-write sequences for one SKU without blocking
/// unrelated keys. Each store instance owns its own registry; two store
/// instances never contend with each other.
#[derive(Default)]
pub(crate) struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub fn for_sku(&self, sku: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(sku.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
