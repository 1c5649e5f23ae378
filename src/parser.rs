use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::models::ListingProduct;

const CONTAINER_SELECTORS: [&str; 3] = ["div.goods-container", "div.item-container", "div.item-cell"];
const LINK_SELECTORS: [&str; 3] = ["a.item-title", "a.goods-title", "a"];

pub struct ListingSelectors {
    containers: Vec<Selector>,
    links: Vec<Selector>,
    name: Selector,
    price: Selector,
    rating: Selector,
    seller: Selector,
}

impl ListingSelectors {
    pub fn new() -> Result<Self> {
        Ok(Self {
            containers: CONTAINER_SELECTORS.iter().map(|s| selector(s)).collect::<Result<_>>()?,
            links: LINK_SELECTORS.iter().map(|s| selector(s)).collect::<Result<_>>()?,
            name: selector("a.goods-title")?,
            price: selector("span.goods-price-value")?,
            rating: selector(".goods-rating")?,
            seller: selector(".goods-brand")?,
        })
    }

    /// Product containers from the first selector in the chain that matches anything.
    pub fn containers<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        for (css, sel) in CONTAINER_SELECTORS.iter().zip(&self.containers) {
            let found: Vec<_> = doc.select(sel).collect();
            debug!("Found {} products with {}", found.len(), css);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

fn first_text(container: &ElementRef, sel: &Selector) -> Option<String> {
    container
        .select(sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
}

/// Parse up to `limit` products from a listing page.
pub fn parse_listing(doc: &Html, selectors: &ListingSelectors, limit: usize) -> Vec<ListingProduct> {
    selectors
        .containers(doc)
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, container)| {
            let product = ListingProduct {
                position: i + 1,
                name: first_text(container, &selectors.name),
                price: first_text(container, &selectors.price),
                rating: first_text(container, &selectors.rating),
                seller: first_text(container, &selectors.seller),
            };
            debug!("Parsed product {:?}", product);
            product
        })
        .collect()
}

/// The detail link of a product container, trying the title anchors before any anchor.
pub fn product_link(container: &ElementRef, selectors: &ListingSelectors) -> Option<String> {
    let link = selectors
        .links
        .iter()
        .find_map(|sel| container.select(sel).next())?;
    link.value().attr("href").map(str::to_string)
}

/// Detail links for up to `limit` containers, `None` where no usable anchor exists.
pub fn product_links(doc: &Html, selectors: &ListingSelectors, limit: usize) -> Vec<Option<String>> {
    selectors
        .containers(doc)
        .iter()
        .take(limit)
        .map(|c| product_link(c, selectors))
        .collect()
}

/// First `max_chars` of a container's markup, for debug output.
pub fn preview(container: &ElementRef, max_chars: usize) -> String {
    let html = container.html();
    if html.chars().count() > max_chars {
        format!("{}...", html.chars().take(max_chars).collect::<String>())
    } else {
        html
    }
}
