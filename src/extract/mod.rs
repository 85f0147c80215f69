//! Field extraction over rendered product pages.
//!
//! Everything in this module is synchronous on purpose: scraper's DOM
//! types are not `Send`, so a document is parsed, read and dropped
//! inside a single call. Async callers wrap these functions in
//! `tokio::task::spawn_blocking` and pass owned HTML strings across.

pub mod fields;
pub mod normalize;

pub use fields::{extract_product, sku_from_url};
