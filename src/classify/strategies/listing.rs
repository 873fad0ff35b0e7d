use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use url::Url;

use crate::classify::signals::Doc;

static CARD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".vehicle-card, .car-card, .listing-card").unwrap());
static IMAGE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.listing__image, div.listing-image, div.image").unwrap()
});
static SECTION_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "section.listings, section.results, div.listings, div.listing-results, \
         div.search-results, ul.listings, ul.vehicle-list",
    )
    .unwrap()
});
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static IMG_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
// Vendor stocklist markup, seen on dealer platforms that skip the common classes
static STOCKLIST_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.stocklist-vehicle a.vehicleLink[href]").unwrap());

/// Resolve and collect an href, keeping insertion order and uniqueness.
pub(super) fn push_resolved(
    href: &str,
    page_url: &Url,
    seen: &mut HashSet<String>,
    out: &mut Vec<Url>,
) {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return;
    }
    if let Ok(abs) = page_url.join(href) {
        if seen.insert(abs.to_string()) {
            out.push(abs);
        }
    }
}

fn first_anchor_href(container: ElementRef<'_>) -> Option<&str> {
    container
        .select(&ANCHOR_SEL)
        .next()
        .and_then(|a| a.value().attr("href"))
}

/// Card-style containers: one detail link per card.
pub fn card_links(doc: &Doc, page_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for card in doc.html.select(&CARD_SEL) {
        if let Some(href) = first_anchor_href(card) {
            push_resolved(href, page_url, &mut seen, &mut out);
        }
    }
    stocklist_fallback(doc, page_url, &mut seen, &mut out);
    out
}

/// Image-first/grid containers, with a generic linked-image fallback.
pub fn image_grid_links(doc: &Doc, page_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for div in doc.html.select(&IMAGE_SEL) {
        if let Some(href) = first_anchor_href(div) {
            push_resolved(href, page_url, &mut seen, &mut out);
        }
    }
    stocklist_fallback(doc, page_url, &mut seen, &mut out);
    // anchors wrapping an image
    for a in doc.html.select(&ANCHOR_SEL) {
        if a.select(&IMG_SEL).next().is_some() {
            if let Some(href) = a.value().attr("href") {
                push_resolved(href, page_url, &mut seen, &mut out);
            }
        }
    }
    out
}

/// Section/list wrapper containers: every anchor inside the wrapper.
pub fn section_links(doc: &Doc, page_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for wrapper in doc.html.select(&SECTION_SEL) {
        for a in wrapper.select(&ANCHOR_SEL) {
            if let Some(href) = a.value().attr("href") {
                push_resolved(href, page_url, &mut seen, &mut out);
            }
        }
    }
    out
}

fn stocklist_fallback(doc: &Doc, page_url: &Url, seen: &mut HashSet<String>, out: &mut Vec<Url>) {
    for a in doc.html.select(&STOCKLIST_SEL) {
        if let Some(href) = a.value().attr("href") {
            push_resolved(href, page_url, seen, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://dealer.example.com/used-cars").unwrap()
    }

    #[test]
    fn card_links_resolved_and_deduped() {
        let doc = Doc::parse(
            r#"<div class="vehicle-card"><a href="/car/1">one</a></div>
               <div class="vehicle-card"><a href="/car/2">two</a></div>
               <div class="listing-card"><a href="/car/1">dup</a></div>"#,
        );
        let links = card_links(&doc, &url());
        let strs: Vec<String> = links.iter().map(|u| u.to_string()).collect();
        assert_eq!(
            strs,
            vec![
                "https://dealer.example.com/car/1",
                "https://dealer.example.com/car/2"
            ]
        );
    }

    #[test]
    fn stocklist_vendor_markup_recognized() {
        let doc = Doc::parse(
            r#"<div class="stocklist-vehicle">
                 <a class="vehicleLink" href="/vehicle/abc-123">x</a>
               </div>"#,
        );
        assert_eq!(card_links(&doc, &url()).len(), 1);
    }

    #[test]
    fn image_grid_finds_wrapped_images() {
        let doc = Doc::parse(
            r#"<div class="listing__image"><a href="/car/10"><img src="a.jpg"></a></div>
               <a href="/car/11"><img src="b.jpg"></a>"#,
        );
        let links = image_grid_links(&doc, &url());
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn section_wrapper_collects_all_anchors() {
        let doc = Doc::parse(
            r#"<section class="listings">
                 <li><a href="/car/1">a</a></li>
                 <li><a href="/car/2">b</a></li>
               </section>
               <a href="/elsewhere">outside</a>"#,
        );
        assert_eq!(section_links(&doc, &url()).len(), 2);
    }

    #[test]
    fn fragments_and_javascript_ignored() {
        let doc = Doc::parse(
            r##"<div class="vehicle-card"><a href="#gallery">x</a></div>
               <div class="vehicle-card"><a href="javascript:void(0)">y</a></div>"##,
        );
        assert!(card_links(&doc, &url()).is_empty());
    }
}
