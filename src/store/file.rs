//! File-backed product store.
//!
//! The whole catalog lives in one JSON array of product records. Every
//! mutation rewrites the file wholesale through a temp-file rename, so
//! a crash mid-write leaves the previous catalog intact. Saved records
//! survive restarts; transient crawl output is process-local and
//! dropped on reopen.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{KeyLocks, ProductStore, Retention, StoredEntry};
use crate::error::StoreError;
use crate::model::Product;

const STORE_FILE: &str = "products.json";

pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, StoredEntry>>,
    /// Serializes whole-file rewrites. Scoped to this store instance,
    /// not a process-global.
    write_guard: Mutex<()>,
    locks: KeyLocks,
    transient_ttl_secs: u64,
}

impl FileStore {
    /// Open (or create) the catalog under `dir`.
    pub fn open(dir: &Path, transient_ttl_secs: u64) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::write_failure(e))?;
        let path = dir.join(STORE_FILE);

        let mut entries = HashMap::new();
        if path.exists() {
            let bytes = std::fs::read(&path).map_err(|e| StoreError::write_failure(e))?;
            let products: Vec<Product> = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("catalog at {} is unreadable ({e}), starting empty", path.display());
                Vec::new()
            });
            for product in products {
                if product.is_saved {
                    entries.insert(
                        product.sku.clone(),
                        StoredEntry::new(product, Retention::Saved),
                    );
                }
            }
        }

        info!(
            "file store opened with {} saved products at {}",
            entries.len(),
            path.display()
        );
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            write_guard: Mutex::new(()),
            locks: KeyLocks::new(),
            transient_ttl_secs,
        })
    }

    /// Default catalog directory: `VITRIN_DATA_DIR` if set, else
    /// `~/.vitrin`.
    pub fn default_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("VITRIN_DATA_DIR") {
            if !dir.is_empty() {
                return PathBuf::from(dir);
            }
        }
        dirs::home_dir()
            .map(|home| home.join(".vitrin"))
            .unwrap_or_else(|| PathBuf::from(".vitrin"))
    }

    /// Rewrite the catalog file from the current entry map.
    async fn persist(&self) -> Result<(), StoreError> {
        let products: Vec<Product> = {
            let entries = self.entries.read().await;
            let mut products: Vec<Product> =
                entries.values().map(|e| e.product.clone()).collect();
            products.sort_by(|a, b| a.sku.cmp(&b.sku));
            products
        };

        let _guard = self.write_guard.lock().await;
        let json =
            serde_json::to_vec_pretty(&products).map_err(|e| StoreError::write_failure(e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| StoreError::write_failure(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::write_failure(e))?;
        debug!("catalog rewritten with {} products", products.len());
        Ok(())
    }
}

#[async_trait]
impl ProductStore for FileStore {
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
        let previous = self
            .entries
            .write()
            .await
            .insert(product.sku.clone(), entry);

        if let Err(e) = self.persist().await {
            // Roll the map back so memory and disk stay consistent.
            let mut entries = self.entries.write().await;
            match previous {
                Some(prev) => entries.insert(product.sku.clone(), prev),
                None => entries.remove(&product.sku),
            };
            return Err(e);
        }
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

        let previous = self
            .entries
            .write()
            .await
            .remove(sku)
            .ok_or_else(|| StoreError::not_found(sku))?;

        if let Err(e) = self.persist().await {
            self.entries
                .write()
                .await
                .insert(sku.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    async fn evict_expired(&self) -> usize {
        let evicted = {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, e| !e.is_expired(self.transient_ttl_secs));
            before - entries.len()
        };

        if evicted > 0 {
            info!("evicted {evicted} stale transient products");
            if let Err(e) = self.persist().await {
                warn!("failed to persist catalog after eviction: {e}");
            }
        }
        evicted
    }
}
