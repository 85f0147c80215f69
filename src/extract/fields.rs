//! Product field extraction with per-field selector fallbacks.
//!
//! Selector lists live in `selectors.json` next to this file. For each
//! field the first selector yielding a non-empty match wins, so coping
//! with a site redesign is a data edit, not a code change. Only `name`
//! and `brand` are hard requirements; every other field degrades to a
//! default.

use crate::error::CrawlError;
use crate::extract::normalize::{clean_whitespace, parse_count, parse_price, parse_rating};
use crate::model::{Product, ProductAttribute};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Per-field selector fallback lists, embedded at compile time.
const SELECTORS_JSON: &str = include_str!("selectors.json");

// Boilerplate commercial defaults for fields the page rarely carries.
pub const DEFAULT_SHIPPING: &str = "24 saatte kargoda";
pub const DEFAULT_STOCK: &str = "Stokta";
pub const DEFAULT_SELLER: &str = "TrendyolExpress";
pub const DEFAULT_PAYMENT_OPTIONS: &str = "Kredi Kartı, Havale/EFT";

// Attribute names used by the extractor and the enhancement post-step.
pub const ATTR_SHIPPING: &str = "shipping";
pub const ATTR_STOCK: &str = "stock";
pub const ATTR_SELLER: &str = "seller";
pub const ATTR_PAYMENT_OPTIONS: &str = "payment options";
pub const ATTR_COLOR: &str = "color";
pub const ATTR_SIZE: &str = "size";

/// Extract the numeric SKU from a product URL: the digits following the
/// final `p-` marker. Query strings and trailing segments are ignored.
pub fn sku_from_url(url: &str) -> Option<String> {
    let re = Regex::new(r"p-(\d+)").expect("SKU pattern is valid");
    re.captures_iter(url).last().map(|c| c[1].to_string())
}

/// Extract a canonical product record from a rendered document.
///
/// `page_url` is the page's final URL after redirects; the SKU derives
/// from it.
pub fn extract_product(html: &str, page_url: &str) -> Result<Product, CrawlError> {
    let document = Html::parse_document(html);
    let config = selector_config();

    let name = first_text(&document, &config, "name")
        .ok_or_else(|| CrawlError::missing_required_field("name"))?;
    let brand = first_text(&document, &config, "brand")
        .ok_or_else(|| CrawlError::missing_required_field("brand"))?;

    let sku = sku_from_url(page_url).unwrap_or_default();
    if sku.is_empty() {
        warn!("no SKU digits in {page_url}, record will key on an empty SKU");
    }

    let discounted_price = first_text(&document, &config, "discounted_price")
        .map(|t| parse_price(&t))
        .unwrap_or(0.0);
    // A page without a separate struck-through price sells at one price.
    let original_price = first_text(&document, &config, "original_price")
        .map(|t| parse_price(&t))
        .filter(|p| *p > 0.0)
        .map_or(discounted_price, |p| p.max(discounted_price));

    let score = first_text(&document, &config, "rating")
        .and_then(|t| parse_rating(&t))
        .filter(|v| *v > 0.0);
    let rating_count = first_text(&document, &config, "rating_count")
        .and_then(|t| parse_count(&t))
        .unwrap_or(0);
    let favorite_count = first_text(&document, &config, "favorite_count")
        .and_then(|t| parse_count(&t))
        .unwrap_or(0);

    let mut product = Product {
        sku,
        name,
        brand,
        category: breadcrumb(&document, &config),
        description: description(&document, &config),
        original_price,
        discounted_price,
        images: gallery_images(&document, &config),
        attributes: detail_attributes(&document, &config),
        score,
        rating_count,
        favorite_count,
        ..Default::default()
    };

    for (field, attr) in [
        ("shipping", ATTR_SHIPPING),
        ("stock", ATTR_STOCK),
        ("seller", ATTR_SELLER),
        ("payment", ATTR_PAYMENT_OPTIONS),
    ] {
        if let Some(value) = first_text(&document, &config, field) {
            product.set_attribute(attr, value);
        }
    }
    apply_site_defaults(&mut product);

    debug!(
        sku = %product.sku,
        images = product.images.len(),
        attributes = product.attributes.len(),
        "extracted product record"
    );
    Ok(product)
}

/// Fill boilerplate commercial attributes the page did not provide.
/// Existing values are never overwritten; the enhancement post-step
/// calls this again to guarantee the entries survive rewrites.
pub fn apply_site_defaults(product: &mut Product) {
    product.ensure_attribute(ATTR_SHIPPING, DEFAULT_SHIPPING);
    product.ensure_attribute(ATTR_STOCK, DEFAULT_STOCK);
    product.ensure_attribute(ATTR_SELLER, DEFAULT_SELLER);
    product.ensure_attribute(ATTR_PAYMENT_OPTIONS, DEFAULT_PAYMENT_OPTIONS);
}

// ── Selector plumbing ──────────────────────────────────────────────────

fn selector_config() -> Value {
    serde_json::from_str(SELECTORS_JSON).unwrap_or_default()
}

fn selector_strings<'a>(config: &'a Value, field: &str) -> Vec<&'a str> {
    config[field]
        .as_array()
        .map(|list| list.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default()
}

fn first_valid_selector(config: &Value, field: &str) -> Option<Selector> {
    selector_strings(config, field)
        .into_iter()
        .find_map(|s| Selector::parse(s).ok())
}

/// First non-empty text for the field, walking the fallback list.
fn first_text(document: &Html, config: &Value, field: &str) -> Option<String> {
    for sel_str in selector_strings(config, field) {
        if let Ok(sel) = Selector::parse(sel_str) {
            for el in document.select(&sel) {
                let text = element_text(&el);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// All matches of the first selector in the fallback list that matches
/// anything at all.
fn first_selection<'a>(document: &'a Html, config: &Value, field: &str) -> Vec<ElementRef<'a>> {
    for sel_str in selector_strings(config, field) {
        if let Ok(sel) = Selector::parse(sel_str) {
            let found: Vec<ElementRef<'a>> = document.select(&sel).collect();
            if !found.is_empty() {
                return found;
            }
        }
    }
    Vec::new()
}

fn element_text(el: &ElementRef) -> String {
    let text: String = el.text().collect::<Vec<_>>().join(" ");
    clean_whitespace(&text)
}

// ── Field assembly ─────────────────────────────────────────────────────

/// Breadcrumb anchors joined with `" > "`, empty crumbs skipped.
fn breadcrumb(document: &Html, config: &Value) -> Option<String> {
    let crumbs: Vec<String> = first_selection(document, config, "breadcrumb")
        .iter()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    if crumbs.is_empty() {
        None
    } else {
        Some(crumbs.join(" > "))
    }
}

/// Main description block followed by every itemized description line,
/// joined as paragraphs.
fn description(document: &Html, config: &Value) -> Option<String> {
    let mut sections: Vec<String> = Vec::new();
    if let Some(main) = first_text(document, config, "description_main") {
        sections.push(main);
    }
    for el in first_selection(document, config, "description_items") {
        let text = element_text(&el);
        if !text.is_empty() {
            sections.push(text);
        }
    }
    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

/// Gallery image URLs in document order, thumbnails rewritten to full
/// resolution, duplicates dropped first-seen.
fn gallery_images(document: &Html, config: &Value) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut images = Vec::new();
    for el in first_selection(document, config, "gallery") {
        let Some(src) = el.value().attr("src") else {
            continue;
        };
        let src = src.trim();
        if src.is_empty() {
            continue;
        }
        let url = full_resolution(src);
        if seen.insert(url.clone()) {
            images.push(url);
        }
    }
    images
}

/// Rewrite known CDN thumbnail URL shapes to their full-size form.
fn full_resolution(src: &str) -> String {
    let re = Regex::new(r"mnresize/\d+/\d+/").expect("thumbnail pattern is valid");
    re.replace(src, "").replace("_mn.jpg", "_org.jpg")
}

/// Name/value pairs from the attribute sections. Names are lowercased
/// and trailing colons stripped; sections missing either side are
/// skipped.
fn detail_attributes(document: &Html, config: &Value) -> Vec<ProductAttribute> {
    let Some(name_sel) = first_valid_selector(config, "attribute_name") else {
        return Vec::new();
    };
    let Some(value_sel) = first_valid_selector(config, "attribute_value") else {
        return Vec::new();
    };

    let mut attributes = Vec::new();
    for section in first_selection(document, config, "attribute_sections") {
        let name = section
            .select(&name_sel)
            .next()
            .map(|el| element_text(&el))
            .map(|t| t.trim_end_matches(':').trim().to_string())
            .unwrap_or_default();
        let value = section
            .select(&value_sel)
            .next()
            .map(|el| element_text(&el))
            .unwrap_or_default();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        attributes.push(ProductAttribute::new(name.to_lowercase(), value));
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_PAGE: &str = r#"
        <html><body>
        <h1 class="pr-new-br"><a href="/acme">Acme</a> Basic Tee</h1>
        <div class="product-price-container">
            <span class="prc-org">399,99 TL</span>
            <span class="prc-dsc">342,39 TL</span>
        </div>
        <div class="product-rating-score">
            <div class="value">4,6</div>
            <div class="total-count">1.240 Değerlendirme</div>
        </div>
        <div class="product-navigation">
            <a href="/">Trendyol</a>
            <a href="/erkek">Erkek</a>
            <a href="/erkek-t-shirt">T-shirt</a>
            <a href="/empty"></a>
        </div>
        <div class="styles-module_slider_ab12cd">
            <img src="https://cdn.example.com/mnresize/128/192/ty100/tee-1.jpg"/>
            <img src="https://cdn.example.com/ty100/tee-1.jpg"/>
            <img src="https://cdn.example.com/ty100/tee-2_mn.jpg"/>
        </div>
        <div class="slicing-attributes">
            <section>
                <div class="slc-title"><h2>Renk:</h2></div>
                <div class="selected">Kırmızı</div>
            </section>
            <section>
                <div class="slc-title"><h2>Kalıp</h2></div>
                <div class="selected">Regular</div>
            </section>
        </div>
        <div class="featured-information">
            <ul id="content-descriptions-list">
                <li>%100 pamuk</li>
                <li>Yumuşak doku</li>
            </ul>
        </div>
        <div class="content-descriptions"><ul><li>Makinede yıkanabilir</li></ul></div>
        <div class="same-day-shipping"><div>Bugün kargoda</div></div>
        </body></html>
    "#;

    const PAGE_URL: &str = "https://www.trendyol.com/acme/basic-tee-p-32965143?boutiqueId=61";

    #[test]
    fn extracts_full_record() {
        let p = extract_product(PRODUCT_PAGE, PAGE_URL).unwrap();

        assert_eq!(p.sku, "32965143");
        assert_eq!(p.name, "Acme Basic Tee");
        assert_eq!(p.brand, "Acme");
        assert_eq!(p.original_price, 399.99);
        assert_eq!(p.discounted_price, 342.39);
        assert_eq!(p.score, Some(4.6));
        assert_eq!(p.rating_count, 1240);
        assert_eq!(p.category.as_deref(), Some("Trendyol > Erkek > T-shirt"));
        assert!(!p.is_main_variant);
        assert!(p.variants.is_empty());
    }

    #[test]
    fn gallery_dedupes_and_upgrades_thumbnails() {
        let p = extract_product(PRODUCT_PAGE, PAGE_URL).unwrap();
        assert_eq!(
            p.images,
            vec![
                "https://cdn.example.com/ty100/tee-1.jpg",
                "https://cdn.example.com/ty100/tee-2_org.jpg",
            ]
        );
    }

    #[test]
    fn detail_attributes_strip_trailing_colons() {
        let p = extract_product(PRODUCT_PAGE, PAGE_URL).unwrap();
        assert_eq!(p.attribute("renk"), Some("Kırmızı"));
        assert_eq!(p.attribute("kalıp"), Some("Regular"));
    }

    #[test]
    fn description_joins_sections_as_paragraphs() {
        let p = extract_product(PRODUCT_PAGE, PAGE_URL).unwrap();
        let desc = p.description.unwrap();
        assert!(desc.contains("%100 pamuk"));
        assert!(desc.contains("\n\nMakinede yıkanabilir"));
    }

    #[test]
    fn boilerplate_defaults_fill_missing_commercial_fields() {
        let p = extract_product(PRODUCT_PAGE, PAGE_URL).unwrap();
        // Present on the page: kept as scraped.
        assert_eq!(p.attribute(ATTR_SHIPPING), Some("Bugün kargoda"));
        // Absent from the page: site defaults.
        assert_eq!(p.attribute(ATTR_STOCK), Some(DEFAULT_STOCK));
        assert_eq!(p.attribute(ATTR_SELLER), Some(DEFAULT_SELLER));
        assert_eq!(p.attribute(ATTR_PAYMENT_OPTIONS), Some(DEFAULT_PAYMENT_OPTIONS));
    }

    #[test]
    fn missing_name_is_a_required_field_error() {
        let html = r#"<html><body><div class="product-price-container">
            <span class="prc-dsc">10,00 TL</span></div></body></html>"#;
        let err = extract_product(html, PAGE_URL).unwrap_err();
        assert!(matches!(
            err,
            CrawlError::MissingRequiredField { field: "name" }
        ));
    }

    #[test]
    fn original_price_defaults_to_discounted() {
        let html = r#"<html><body>
            <h1 class="pr-new-br"><a>Acme</a> Tee</h1>
            <div class="product-price-container"><span class="prc-dsc">342,39 TL</span></div>
            </body></html>"#;
        let p = extract_product(html, PAGE_URL).unwrap();
        assert_eq!(p.discounted_price, 342.39);
        assert_eq!(p.original_price, 342.39);
    }

    #[test]
    fn sku_comes_from_final_p_marker() {
        assert_eq!(
            sku_from_url("https://www.trendyol.com/acme/tee-p-32965143"),
            Some("32965143".to_string())
        );
        assert_eq!(
            sku_from_url("https://www.trendyol.com/p-1/bundle-p-99?x=1"),
            Some("99".to_string())
        );
        assert_eq!(sku_from_url("https://www.trendyol.com/acme/tee"), None);
    }

    #[test]
    fn all_configured_selectors_parse() {
        let config = selector_config();
        let fields = config.as_object().expect("selector config is an object");
        for (field, list) in fields {
            for sel in list.as_array().expect("each field maps to a list") {
                let sel = sel.as_str().expect("selectors are strings");
                assert!(
                    Selector::parse(sel).is_ok(),
                    "selector for '{field}' does not parse: {sel}"
                );
            }
        }
    }
}
