//! Canonical data model for crawled products.

pub mod product;

pub use product::{Product, ProductAttribute, ProductVariants};
