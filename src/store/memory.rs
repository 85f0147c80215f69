//! In-memory product store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{KeyLocks, ProductStore, Retention, StoredEntry};
use crate::error::StoreError;
use crate::model::Product;

pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    locks: KeyLocks,
    transient_ttl_secs: u64,
}

impl MemoryStore {
    pub fn new(transient_ttl_secs: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            locks: KeyLocks::new(),
            transient_ttl_secs,
        }
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get(&self, sku: &str) -> Result<Product, StoreError> {
        self.entries
            .read()
            .await
            .get(sku)
            .map(|e| e.product.clone())
            .ok_or_else(|| StoreError::not_found(sku))
    }

    async fn set(&self, mut product: Product, retention: Retention) -> Result<Product, StoreError> {
        let lock = self.locks.for_sku(&product.sku);
        let _guard = lock.lock().await;

        product.is_saved = retention == Retention::Saved;
        let entry = StoredEntry::new(product.clone(), retention);
        self.entries.write().await.insert(product.sku.clone(), entry);
        debug!(sku = %product.sku, ?retention, "stored product");
        Ok(product)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<Product>, StoreError> {
        let entries = self.entries.read().await;
        let mut products: Vec<Product> = entries
            .values()
            .filter(|e| e.product.sku.starts_with(prefix))
            .map(|e| e.product.clone())
            .collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(products)
    }

    async fn remove(&self, sku: &str) -> Result<(), StoreError> {
        let lock = self.locks.for_sku(sku);
        let _guard = lock.lock().await;

        self.entries
            .write()
            .await
            .remove(sku)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(sku))
    }

    async fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(self.transient_ttl_secs));
        let evicted = before - entries.len();
        drop(entries);

        if evicted > 0 {
            info!("evicted {evicted} stale transient products");
        }
        evicted
    }
}
