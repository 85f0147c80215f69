//! Product records, attribute pairs and variant summaries.
//!
//! One shape serves every surface: the crawl response, the store file
//! format and the REST payloads all speak this camelCase wire format.

use serde::{Deserialize, Serialize};

/// One name/value pair scraped from a product page or added during
/// enhancement.
///
/// Deserialized payloads may carry duplicate names; reads resolve to the
/// last occurrence, and writes through [`Product::set_attribute`] keep a
/// single entry per name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductAttribute {
    pub name: String,
    pub value: String,
}

impl ProductAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Canonical product record produced by the crawl pipeline.
///
/// Derived variants reference their base through `parent_sku` and carry
/// the base SKU plus a size slug as their own SKU. `Clone` is a deep
/// copy here: every container is owned, so mutating a cloned variant's
/// images, attributes or nested variants never reaches the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    pub sku: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_sku: Option<String>,
    pub name: String,
    pub brand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub original_price: f64,
    pub discounted_price: f64,
    pub images: Vec<String>,
    pub attributes: Vec<ProductAttribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub variants: Vec<Product>,
    pub is_main_variant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub rating_count: u32,
    pub favorite_count: u32,
    pub is_saved: bool,
}

impl Product {
    /// Look up an attribute value by exact name. Later entries win when
    /// a deserialized payload carries duplicates.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, overwriting the existing entry of the same name.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(ProductAttribute::new(name, value)),
        }
    }

    /// Set an attribute only when no entry of that name exists yet.
    pub fn ensure_attribute(&mut self, name: &str, value: &str) {
        if self.attribute(name).is_none() {
            self.attributes.push(ProductAttribute::new(name, value));
        }
    }
}

/// Color/size summary for a product group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductVariants {
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub variants: Vec<Product>,
}

impl ProductVariants {
    /// Derive the summary from a stored root product: distinct colors
    /// and sizes in first-seen order, taken from the root itself plus
    /// every entry in its flattened variant list.
    pub fn from_product(root: &Product) -> Self {
        let mut colors: Vec<String> = Vec::new();
        let mut sizes: Vec<String> = Vec::new();

        for p in std::iter::once(root).chain(root.variants.iter()) {
            if let Some(color) = &p.color {
                if !color.is_empty() && !colors.contains(color) {
                    colors.push(color.clone());
                }
            }
            if let Some(size) = &p.size {
                if !size.is_empty() && !sizes.contains(size) {
                    sizes.push(size.clone());
                }
            }
        }

        Self {
            colors,
            sizes,
            variants: root.variants.clone(),
        }
    }
}
