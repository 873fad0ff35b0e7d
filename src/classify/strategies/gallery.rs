use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::Selector;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::classify::signals::Doc;

static CONTAINER_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".gallery, .carousel, .thumbnails, .slider, ul.gallery").unwrap()
});
static IMG_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static VIDEO_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("video").unwrap());
static SOURCE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("source").unwrap());
// Vendor carousel markup: linked full-size images plus lazy thumbnails
static VENDOR_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "div.vehicle-content-slider--side-thumbs__carousel a[href], \
         div.vehicle-content-slider-container a[href]",
    )
    .unwrap()
});
static VENDOR_THUMB_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.vehicle-content-slider--side-thumbs__thumbs-prev img[data-src]").unwrap()
});

const LARGE_HINTS: &[&str] = &["large", "full", "zoom", "1024", "800"];
const IMG_SRC_ATTRS: &[&str] = &["data-large", "data-src", "src", "data-original"];

#[derive(Debug, Default, Serialize)]
pub struct GalleryMedia {
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

impl GalleryMedia {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty()
    }
}

fn push(base: &Url, href: &str, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    let href = href.trim();
    if href.is_empty() {
        return;
    }
    if let Ok(abs) = base.join(href) {
        let s = abs.to_string();
        if seen.insert(s.clone()) {
            out.push(s);
        }
    }
}

fn img_src<'a>(img: scraper::ElementRef<'a>) -> Option<&'a str> {
    IMG_SRC_ATTRS.iter().find_map(|attr| img.value().attr(attr))
}

/// Collect gallery images and video sources, de-duplicated in discovery
/// order: structured-data image fields, gallery/carousel containers,
/// vendor carousel markup, large-image filename hints, Open Graph image.
pub fn collect(doc: &Doc, page_url: &Url) -> GalleryMedia {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for obj in &doc.jsonld {
        match obj.get("image").or_else(|| obj.get("images")) {
            Some(Value::String(s)) => push(page_url, s, &mut seen, &mut images),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::String(s) = item {
                        push(page_url, s, &mut seen, &mut images);
                    }
                }
            }
            _ => {}
        }
    }

    for container in doc.html.select(&CONTAINER_SEL) {
        for img in container.select(&IMG_SEL) {
            if let Some(src) = img_src(img) {
                push(page_url, src, &mut seen, &mut images);
            }
        }
    }

    for a in doc.html.select(&VENDOR_LINK_SEL) {
        if let Some(href) = a.value().attr("href") {
            push(page_url, href, &mut seen, &mut images);
        }
    }
    for img in doc.html.select(&VENDOR_THUMB_SEL) {
        if let Some(src) = img.value().attr("data-src") {
            push(page_url, src, &mut seen, &mut images);
        }
    }

    // any image whose filename hints at a full-size variant
    for img in doc.html.select(&IMG_SEL) {
        if let Some(src) = img_src(img) {
            let lower = src.to_lowercase();
            if LARGE_HINTS.iter().any(|h| lower.contains(h)) {
                push(page_url, src, &mut seen, &mut images);
            }
        }
    }

    if let Some(og) = doc.meta(Some("og:image"), None) {
        push(page_url, &og, &mut seen, &mut images);
    }

    let mut vid_seen = HashSet::new();
    let mut videos = Vec::new();
    for video in doc.html.select(&VIDEO_SEL) {
        if let Some(src) = video.value().attr("src") {
            push(page_url, src, &mut vid_seen, &mut videos);
        }
        for source in video.select(&SOURCE_SEL) {
            if let Some(src) = source.value().attr("src") {
                push(page_url, src, &mut vid_seen, &mut videos);
            }
        }
    }

    GalleryMedia { images, videos }
}
