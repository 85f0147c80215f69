//! Variant discovery and resolution.
//!
//! Product pages link their color variants as anchors and list size
//! variants as inline controls. Resolution is color-major: every color
//! document is fetched once, then its available sizes expand into
//! sellable leaf records. The structure makes unbounded recursion
//! impossible: color pages are fetched exactly once each and size
//! expansion never fetches at all.

use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::error::CrawlError;
use crate::extract::fields::{self, ATTR_COLOR, ATTR_SIZE};
use crate::extract::normalize::{clean_whitespace, slug};
use crate::fetch::PageFetcher;
use crate::model::Product;

/// Color-variant anchors inside the slicing attributes block.
const COLOR_ANCHOR_SELECTORS: [&str; 2] = [".slicing-attributes a.slc-img", "a.slc-img"];
/// Size controls; sold-out ones carry a marker class.
const SIZE_CONTROL_SELECTORS: [&str; 2] = [".size-variant-wrapper .sp-itm", ".sp-itm"];
const SIZE_DISABLED_CLASSES: [&str; 2] = ["so", "disabled"];

/// Linked color pages are fetched a few at a time, results kept in
/// anchor order.
const COLOR_FETCH_CONCURRENCY: usize = 3;

/// One color-variant anchor as discovered in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorAnchor {
    /// Display label from the anchor title or image alt text.
    pub label: Option<String>,
    /// Link to the color's own page, when the anchor has one.
    pub href: Option<String>,
    /// Marked as the currently shown color.
    pub selected: bool,
}

/// One size control as discovered in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeControl {
    pub label: String,
    pub disabled: bool,
}

/// Everything the crawler needs back from variant resolution.
#[derive(Debug)]
pub struct VariantResolution {
    /// The crawled page's own record, color attributed.
    pub root: Product,
    /// Color bases fetched from linked anchors, in anchor order.
    pub linked_bases: Vec<Product>,
    /// Sellable output records, color-major then size-minor.
    pub products: Vec<Product>,
}

enum Slot {
    Current { label: Option<String> },
    Linked { label: Option<String>, url: String },
}

/// Resolve the full variant set for an already-extracted base product.
///
/// `page_html` is the document `base` came from and `page_url` its
/// final URL (relative variant links resolve against it). A branch that
/// fails to fetch or extract is logged and skipped; its siblings still
/// resolve. A page without any variant markup resolves to just the
/// base.
pub async fn resolve(
    fetcher: Arc<dyn PageFetcher>,
    page_url: &str,
    page_html: String,
    base: Product,
) -> VariantResolution {
    let (anchors, root_sizes) = tokio::task::spawn_blocking(move || {
        (
            discover_color_anchors(&page_html),
            discover_size_controls(&page_html),
        )
    })
    .await
    .unwrap_or_else(|e| {
        warn!("variant discovery task failed: {e}");
        (Vec::new(), Vec::new())
    });

    // One slot per resolvable color, document order. The current page
    // is always a color of its own, whether or not an anchor says so.
    let mut slots: Vec<Slot> = Vec::new();
    let mut has_current = false;
    for anchor in &anchors {
        if anchor.selected && !has_current {
            has_current = true;
            slots.push(Slot::Current {
                label: anchor.label.clone(),
            });
        } else if let Some(href) = &anchor.href {
            match absolute_url(page_url, href) {
                Some(url) => slots.push(Slot::Linked {
                    label: anchor.label.clone(),
                    url,
                }),
                None => warn!("color anchor href '{href}' does not resolve against {page_url}"),
            }
        } else {
            debug!("color anchor without link or selection, skipped");
        }
    }
    if !has_current {
        slots.insert(0, Slot::Current { label: None });
    }

    let linked: Vec<Option<(Product, Vec<SizeControl>)>> = stream::iter(
        slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Linked { label, url } => Some((label.clone(), url.clone())),
                Slot::Current { .. } => None,
            })
            .collect::<Vec<_>>(),
    )
    .map(|(label, url)| {
        let fetcher = Arc::clone(&fetcher);
        async move { fetch_color_page(fetcher, &url, label).await }
    })
    .buffered(COLOR_FETCH_CONCURRENCY)
    .collect()
    .await;

    let mut root = base;
    let mut linked_bases: Vec<Product> = Vec::new();
    let mut products: Vec<Product> = Vec::new();
    let mut linked_iter = linked.into_iter();

    for slot in slots {
        let (color_product, sizes) = match slot {
            Slot::Current { label } => {
                apply_color(&mut root, label);
                (root.clone(), root_sizes.clone())
            }
            Slot::Linked { .. } => match linked_iter.next().flatten() {
                Some((product, sizes)) => {
                    linked_bases.push(product.clone());
                    (product, sizes)
                }
                None => continue,
            },
        };
        append_sized_leaves(&mut products, &color_product, &sizes);
    }

    VariantResolution {
        root,
        linked_bases,
        products,
    }
}

/// Fetch and extract one linked color page. `None` marks a skipped
/// branch.
async fn fetch_color_page(
    fetcher: Arc<dyn PageFetcher>,
    url: &str,
    label: Option<String>,
) -> Option<(Product, Vec<SizeControl>)> {
    let page = match fetcher.fetch(url).await {
        Ok(page) => page,
        Err(e) => {
            warn!("{}", CrawlError::variant_fetch(url, format!("{e:#}")));
            return None;
        }
    };

    let final_url = page.final_url.clone();
    let parsed = tokio::task::spawn_blocking(move || {
        let product = fields::extract_product(&page.html, &final_url)?;
        let sizes = discover_size_controls(&page.html);
        Ok::<_, CrawlError>((product, sizes))
    })
    .await;

    match parsed {
        Ok(Ok((mut product, sizes))) => {
            apply_color(&mut product, label);
            Some((product, sizes))
        }
        Ok(Err(e)) => {
            warn!("{}", CrawlError::variant_fetch(url, e));
            None
        }
        Err(e) => {
            warn!("{}", CrawlError::variant_fetch(url, format!("parse task failed: {e}")));
            None
        }
    }
}

/// Expand one color-level product into its available size leaves, or
/// keep the color product itself when the page offers no sizes.
fn append_sized_leaves(products: &mut Vec<Product>, color_product: &Product, sizes: &[SizeControl]) {
    let available: Vec<&SizeControl> = sizes
        .iter()
        .filter(|s| !s.disabled && !s.label.is_empty())
        .collect();

    if available.is_empty() {
        products.push(color_product.clone());
        return;
    }

    for size in available {
        let mut leaf = color_product.clone();
        leaf.sku = format!("{}-{}", color_product.sku, slug(&size.label));
        leaf.parent_sku = Some(color_product.sku.clone());
        leaf.size = Some(size.label.clone());
        leaf.set_attribute(ATTR_SIZE, size.label.clone());
        leaf.is_main_variant = false;
        leaf.variants = Vec::new();
        products.push(leaf);
    }
}

fn apply_color(product: &mut Product, label: Option<String>) {
    if let Some(label) = label {
        product.set_attribute(ATTR_COLOR, label.clone());
        product.color = Some(label);
    }
}

/// Join a possibly relative variant link against the page URL.
fn absolute_url(page_url: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    Url::parse(page_url)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

// ── Document discovery ─────────────────────────────────────────────────

/// All color anchors in document order.
pub fn discover_color_anchors(html: &str) -> Vec<ColorAnchor> {
    let document = Html::parse_document(html);
    let img_sel = Selector::parse("img").expect("img selector is valid");

    for sel_str in COLOR_ANCHOR_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        let anchors: Vec<ColorAnchor> = document
            .select(&sel)
            .map(|el| {
                let label = el
                    .value()
                    .attr("title")
                    .map(clean_whitespace)
                    .filter(|t| !t.is_empty())
                    .or_else(|| {
                        el.select(&img_sel)
                            .next()
                            .and_then(|img| img.value().attr("alt"))
                            .map(clean_whitespace)
                            .filter(|t| !t.is_empty())
                    })
                    .or_else(|| Some(element_text(&el)).filter(|t| !t.is_empty()));
                let href = el
                    .value()
                    .attr("href")
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string);
                let selected = el.value().classes().any(|c| c == "selected");
                ColorAnchor {
                    label,
                    href,
                    selected,
                }
            })
            .collect();
        if !anchors.is_empty() {
            return anchors;
        }
    }
    Vec::new()
}

/// All size controls in document order, disabled ones flagged.
pub fn discover_size_controls(html: &str) -> Vec<SizeControl> {
    let document = Html::parse_document(html);

    for sel_str in SIZE_CONTROL_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        let controls: Vec<SizeControl> = document
            .select(&sel)
            .map(|el| SizeControl {
                label: element_text(&el),
                disabled: el
                    .value()
                    .classes()
                    .any(|c| SIZE_DISABLED_CLASSES.contains(&c)),
            })
            .collect();
        if !controls.is_empty() {
            return controls;
        }
    }
    Vec::new()
}

fn element_text(el: &ElementRef) -> String {
    let text: String = el.text().collect::<Vec<_>>().join(" ");
    clean_whitespace(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchedPage;
    use async_trait::async_trait;
    use std::collections::HashMap;

    const ROOT_URL: &str = "https://shop.example.com/acme/tee-red-p-111";
    const BLUE_URL: &str = "https://shop.example.com/acme/tee-blue-p-222";

    const ROOT_PAGE: &str = r#"
        <html><body>
        <h1 class="pr-new-br"><a href="/acme">Acme</a> Basic Tee</h1>
        <div class="product-price-container"><span class="prc-dsc">342,39 TL</span></div>
        <div class="slicing-attributes">
            <section>
                <div class="slc-title"><h2>Renk</h2></div>
                <a class="slc-img selected" title="Red"><img src="/red.jpg" alt="Red"/></a>
                <a class="slc-img" href="/acme/tee-blue-p-222" title="Blue"><img src="/blue.jpg" alt="Blue"/></a>
            </section>
        </div>
        <div class="size-variant-wrapper">
            <div class="sp-itm">S</div>
            <div class="sp-itm so">M</div>
            <div class="sp-itm">L</div>
        </div>
        </body></html>
    "#;

    const BLUE_PAGE: &str = r#"
        <html><body>
        <h1 class="pr-new-br"><a href="/acme">Acme</a> Basic Tee</h1>
        <div class="product-price-container"><span class="prc-dsc">342,39 TL</span></div>
        <div class="size-variant-wrapper">
            <div class="sp-itm">S</div>
            <div class="sp-itm so">M</div>
            <div class="sp-itm">L</div>
        </div>
        </body></html>
    "#;

    struct StaticFetcher {
        pages: HashMap<String, String>,
    }

    impl StaticFetcher {
        fn new(pages: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> anyhow::Result<FetchedPage> {
            match self.pages.get(url) {
                Some(html) => Ok(FetchedPage {
                    url: url.to_string(),
                    final_url: url.to_string(),
                    html: html.clone(),
                    status: 200,
                }),
                None => anyhow::bail!("no fixture for {url}"),
            }
        }
    }

    fn base_product() -> Product {
        let mut base = fields::extract_product(ROOT_PAGE, ROOT_URL).unwrap();
        base.is_main_variant = true;
        base
    }

    #[test]
    fn discovers_color_anchors_in_dom_order() {
        let anchors = discover_color_anchors(ROOT_PAGE);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].label.as_deref(), Some("Red"));
        assert!(anchors[0].selected);
        assert!(anchors[0].href.is_none());
        assert_eq!(anchors[1].label.as_deref(), Some("Blue"));
        assert!(!anchors[1].selected);
        assert_eq!(anchors[1].href.as_deref(), Some("/acme/tee-blue-p-222"));
    }

    #[test]
    fn discovers_size_controls_with_disabled_markers() {
        let sizes = discover_size_controls(ROOT_PAGE);
        assert_eq!(
            sizes,
            vec![
                SizeControl { label: "S".to_string(), disabled: false },
                SizeControl { label: "M".to_string(), disabled: true },
                SizeControl { label: "L".to_string(), disabled: false },
            ]
        );
    }

    #[test]
    fn plain_pages_have_no_variant_markup() {
        let html = "<html><body><h1 class=\"pr-new-br\">Acme Tee</h1></body></html>";
        assert!(discover_color_anchors(html).is_empty());
        assert!(discover_size_controls(html).is_empty());
    }

    #[tokio::test]
    async fn expands_colors_and_sizes_into_leaves() {
        let fetcher = StaticFetcher::new(&[(BLUE_URL, BLUE_PAGE)]);
        let resolution =
            resolve(fetcher, ROOT_URL, ROOT_PAGE.to_string(), base_product()).await;

        let skus: Vec<&str> = resolution.products.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["111-s", "111-l", "222-s", "222-l"]);

        for leaf in &resolution.products {
            assert!(!leaf.is_main_variant);
            assert!(leaf.variants.is_empty());
            assert!(leaf.size.is_some());
        }
        assert_eq!(resolution.products[0].parent_sku.as_deref(), Some("111"));
        assert_eq!(resolution.products[2].parent_sku.as_deref(), Some("222"));
        assert_eq!(resolution.products[0].color.as_deref(), Some("Red"));
        assert_eq!(resolution.products[2].color.as_deref(), Some("Blue"));

        // The disabled size never shows up anywhere.
        assert!(!skus.iter().any(|s| s.ends_with("-m")));

        assert_eq!(resolution.root.color.as_deref(), Some("Red"));
        assert!(resolution.root.is_main_variant);
        assert_eq!(resolution.linked_bases.len(), 1);
        assert_eq!(resolution.linked_bases[0].sku, "222");
        assert_eq!(resolution.linked_bases[0].color.as_deref(), Some("Blue"));
    }

    #[tokio::test]
    async fn failed_color_branches_are_skipped() {
        // No fixture for the blue page: that branch fails to fetch.
        let fetcher = StaticFetcher::new(&[]);
        let resolution =
            resolve(fetcher, ROOT_URL, ROOT_PAGE.to_string(), base_product()).await;

        let skus: Vec<&str> = resolution.products.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["111-s", "111-l"]);
        assert!(resolution.linked_bases.is_empty());
    }

    #[tokio::test]
    async fn page_without_variants_resolves_to_itself() {
        let html = r#"<html><body>
            <h1 class="pr-new-br"><a href="/acme">Acme</a> Solo Tee</h1>
            <div class="product-price-container"><span class="prc-dsc">99,90 TL</span></div>
            </body></html>"#;
        let base = {
            let mut p = fields::extract_product(html, ROOT_URL).unwrap();
            p.is_main_variant = true;
            p
        };

        let fetcher = StaticFetcher::new(&[]);
        let resolution = resolve(fetcher, ROOT_URL, html.to_string(), base).await;

        assert_eq!(resolution.products.len(), 1);
        assert_eq!(resolution.products[0].sku, "111");
        assert!(resolution.products[0].is_main_variant);
        assert!(resolution.products[0].parent_sku.is_none());
        assert!(resolution.linked_bases.is_empty());
    }

    #[tokio::test]
    async fn sizes_without_colors_expand_the_base() {
        let html = r#"<html><body>
            <h1 class="pr-new-br"><a href="/acme">Acme</a> Sized Tee</h1>
            <div class="size-variant-wrapper">
                <div class="sp-itm">36</div>
                <div class="sp-itm">38</div>
            </div>
            </body></html>"#;
        let base = {
            let mut p = fields::extract_product(html, ROOT_URL).unwrap();
            p.is_main_variant = true;
            p
        };

        let fetcher = StaticFetcher::new(&[]);
        let resolution = resolve(fetcher, ROOT_URL, html.to_string(), base).await;

        let skus: Vec<&str> = resolution.products.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["111-36", "111-38"]);
        assert!(resolution.products.iter().all(|p| !p.is_main_variant));
    }
}
