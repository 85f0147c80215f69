//! Error types shared across the crawl, enhancement and storage layers.
//!
//! Each layer keeps its own enum so callers can tell recoverable
//! conditions (skip this variant branch, keep the template description)
//! from ones that must surface to the API caller.

use thiserror::Error;

/// Errors raised while turning a page into product records.
#[derive(Error, Debug, Clone)]
pub enum CrawlError {
    /// A field the record cannot exist without was absent from the document.
    #[error("required field '{field}' not found in document")]
    MissingRequiredField { field: &'static str },

    /// The page itself could not be fetched or rendered.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// A linked variant page could not be resolved. Recoverable: the
    /// branch is skipped and the remaining siblings still resolve.
    #[error("variant page {url} could not be resolved: {reason}")]
    VariantFetch { url: String, reason: String },

    /// Persisting crawl output failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CrawlError {
    pub fn missing_required_field(field: &'static str) -> Self {
        Self::MissingRequiredField { field }
    }

    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn variant_fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::VariantFetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by product stores.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("product with SKU '{sku}' not found")]
    NotFound { sku: String },

    /// A write could not be completed. Surfaced to the API caller as-is;
    /// stores never retry on their own.
    #[error("store write failed: {reason}")]
    WriteFailure { reason: String },
}

impl StoreError {
    pub fn not_found(sku: impl Into<String>) -> Self {
        Self::NotFound { sku: sku.into() }
    }

    pub fn write_failure(reason: impl std::fmt::Display) -> Self {
        Self::WriteFailure {
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by the description rewrite collaborator. Always
/// recoverable: enhancement falls back to the deterministic template.
#[derive(Error, Debug, Clone)]
pub enum EnhanceError {
    #[error("rewrite call failed: {reason}")]
    RewriteFailed { reason: String },

    #[error("rewrite returned unusable output: {reason}")]
    UnusableOutput { reason: String },
}

impl EnhanceError {
    pub fn rewrite_failed(reason: impl std::fmt::Display) -> Self {
        Self::RewriteFailed {
            reason: reason.to_string(),
        }
    }

    pub fn unusable_output(reason: impl std::fmt::Display) -> Self {
        Self::UnusableOutput {
            reason: reason.to_string(),
        }
    }
}
