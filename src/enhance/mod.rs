//! Product enhancement: deterministic template plus one rewrite.
//!
//! Enhancement never fails. The template description always exists
//! first; the rewrite backend then gets exactly one bounded attempt to
//! improve it, and any failure (timeout, transport, garbage output)
//! leaves the template in place.

pub mod rewrite;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::extract::fields;
use crate::model::Product;

pub use rewrite::{HttpRewriter, NoopRewriter, RewriteFacts, RewriteOutcome, Rewriter};

/// Attributes guaranteed to exist after enhancement, with their
/// backfill values. Scraped values always win over these.
pub const STANDARD_ATTRIBUTES: [(&str, &str); 6] = [
    ("material", "Not specified"),
    ("style", "Casual"),
    ("gender", "Unisex"),
    ("dimensions", "Standard"),
    ("features", "Comfortable everyday use"),
    ("care instructions", "Follow label instructions"),
];

/// Score assigned when neither the page nor the rewrite produced one.
pub const DEFAULT_SCORE: f64 = 4.0;
/// Social-proof floors; existing higher counts are never lowered.
pub const MIN_RATING_COUNT: u32 = 1;
pub const MIN_FAVORITE_COUNT: u32 = 1;

const DEFAULT_REWRITE_TIMEOUT_MS: u64 = 20_000;

pub struct Enhancer {
    rewriter: Arc<dyn Rewriter>,
    rewrite_timeout: Duration,
}

impl Enhancer {
    pub fn new(rewriter: Arc<dyn Rewriter>) -> Self {
        Self {
            rewriter,
            rewrite_timeout: Duration::from_millis(DEFAULT_REWRITE_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.rewrite_timeout = timeout;
        self
    }

    /// Enhance one product and return it.
    ///
    /// Ordering is fixed: backfill the standard attributes, build the
    /// template description, offer the facts to the rewrite backend
    /// once, then run the closing pass (boilerplate, floors, default
    /// score).
    pub async fn enhance(&self, mut product: Product) -> Product {
        backfill_standard_attributes(&mut product);

        let template = template_description(&product);
        product.description = Some(template);

        let facts = RewriteFacts::from_product(&product);
        match tokio::time::timeout(self.rewrite_timeout, self.rewriter.rewrite(&facts)).await {
            Ok(Ok(outcome)) => apply_outcome(&mut product, outcome),
            Ok(Err(e)) => {
                warn!(sku = %product.sku, "description rewrite failed ({e}), keeping template");
            }
            Err(_) => {
                warn!(
                    sku = %product.sku,
                    "description rewrite timed out after {:?}, keeping template",
                    self.rewrite_timeout
                );
            }
        }

        apply_post_enhancement(&mut product);
        debug!(sku = %product.sku, "enhanced product");
        product
    }
}

/// Fill the standard attribute set without touching scraped values.
pub fn backfill_standard_attributes(product: &mut Product) {
    for (name, default) in STANDARD_ATTRIBUTES {
        product.ensure_attribute(name, default);
    }
}

/// Deterministic description assembled from normalized fields.
/// Non-empty for any record that passed extraction, since name and
/// brand are guaranteed there.
pub fn template_description(product: &Product) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.push(format!("{} by {}.", product.name, product.brand));
    if let Some(color) = &product.color {
        parts.push(format!("Color: {color}."));
    }
    if let Some(category) = &product.category {
        parts.push(format!("Category: {category}."));
    }
    for (name, _) in STANDARD_ATTRIBUTES {
        if let Some(value) = product.attribute(name) {
            parts.push(format!("{}: {}.", capitalize(name), value));
        }
    }
    if product.discounted_price > 0.0 && product.discounted_price < product.original_price {
        parts.push(format!(
            "Now {:.2} instead of {:.2}.",
            product.discounted_price, product.original_price
        ));
    }
    parts.join(" ")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Merge usable rewrite output into the record.
fn apply_outcome(product: &mut Product, outcome: RewriteOutcome) {
    if !outcome.description.trim().is_empty() {
        product.description = Some(outcome.description);
    }
    if let Some(name) = outcome.name {
        product.name = name;
    }
    if let Some(brand) = outcome.brand {
        product.brand = brand;
    }
    if let Some(score) = outcome.score {
        product.score = Some(score);
    }
}

/// Closing pass: commercial boilerplate, social-proof floors, and the
/// default score only when nothing else produced one.
fn apply_post_enhancement(product: &mut Product) {
    fields::apply_site_defaults(product);
    product.rating_count = product.rating_count.max(MIN_RATING_COUNT);
    product.favorite_count = product.favorite_count.max(MIN_FAVORITE_COUNT);
    if product.score.is_none() {
        product.score = Some(DEFAULT_SCORE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnhanceError;
    use async_trait::async_trait;

    fn product() -> Product {
        Product {
            sku: "32965143".to_string(),
            name: "Basic Tee".to_string(),
            brand: "Acme".to_string(),
            color: Some("Red".to_string()),
            original_price: 399.99,
            discounted_price: 342.39,
            ..Default::default()
        }
    }

    struct EnvelopeRewriter;

    #[async_trait]
    impl Rewriter for EnvelopeRewriter {
        async fn rewrite(&self, _: &RewriteFacts) -> Result<RewriteOutcome, EnhanceError> {
            Ok(RewriteOutcome {
                description: "Hand-picked premium cotton tee.".to_string(),
                name: Some("Premium Tee".to_string()),
                brand: None,
                score: Some(4.8),
            })
        }
    }

    struct SlowRewriter;

    #[async_trait]
    impl Rewriter for SlowRewriter {
        async fn rewrite(&self, _: &RewriteFacts) -> Result<RewriteOutcome, EnhanceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RewriteOutcome {
                description: "too late".to_string(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn template_covers_the_core_facts() {
        let mut p = product();
        backfill_standard_attributes(&mut p);
        let template = template_description(&p);

        assert!(template.starts_with("Basic Tee by Acme."));
        assert!(template.contains("Color: Red."));
        assert!(template.contains("Material: Not specified."));
        assert!(template.contains("Now 342.39 instead of 399.99."));
    }

    #[tokio::test]
    async fn enhancement_without_backend_keeps_the_template() {
        let enhancer = Enhancer::new(Arc::new(NoopRewriter));
        let enhanced = enhancer.enhance(product()).await;

        let description = enhanced.description.unwrap();
        assert!(!description.trim().is_empty());
        assert!(description.starts_with("Basic Tee by Acme."));
        assert_eq!(enhanced.score, Some(DEFAULT_SCORE));
        assert_eq!(enhanced.rating_count, MIN_RATING_COUNT);
        assert_eq!(enhanced.favorite_count, MIN_FAVORITE_COUNT);
    }

    #[tokio::test]
    async fn usable_rewrites_replace_the_template() {
        let enhancer = Enhancer::new(Arc::new(EnvelopeRewriter));
        let enhanced = enhancer.enhance(product()).await;

        assert_eq!(
            enhanced.description.as_deref(),
            Some("Hand-picked premium cotton tee.")
        );
        assert_eq!(enhanced.name, "Premium Tee");
        // The envelope had no brand, the scraped one stays.
        assert_eq!(enhanced.brand, "Acme");
        assert_eq!(enhanced.score, Some(4.8));
    }

    #[tokio::test]
    async fn slow_rewrites_time_out_to_the_template() {
        let enhancer =
            Enhancer::new(Arc::new(SlowRewriter)).with_timeout(Duration::from_millis(50));
        let enhanced = enhancer.enhance(product()).await;

        let description = enhanced.description.unwrap();
        assert!(description.starts_with("Basic Tee by Acme."));
        assert_ne!(description, "too late");
    }

    #[tokio::test]
    async fn scraped_values_survive_enhancement() {
        let mut p = product();
        p.set_attribute("material", "Organic cotton");
        p.score = Some(4.6);
        p.rating_count = 1240;

        let enhancer = Enhancer::new(Arc::new(NoopRewriter));
        let enhanced = enhancer.enhance(p).await;

        assert_eq!(enhanced.attribute("material"), Some("Organic cotton"));
        assert_eq!(enhanced.score, Some(4.6));
        assert_eq!(enhanced.rating_count, 1240);
        // Backfill still fills the rest of the standard set.
        assert_eq!(enhanced.attribute("style"), Some("Casual"));
    }
}
