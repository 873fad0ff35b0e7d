use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use serde_json::Value;
use url::Url;

use crate::classify::jsonld;
use crate::classify::signals::Doc;

use super::listing::push_resolved;

static JSON_SCRIPT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/json"]"#).unwrap());
static SCRIPT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());
static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static ANY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("*").unwrap());

static FETCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"fetch\(['"]([^'"]+)['"]"#).unwrap());
static AXIOS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"axios\.(?:get|post)\(['"]([^'"]+)['"]"#).unwrap());
static XHR_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)['"](/[^'"]+?(?:listing|list|search|load|api|ajax)[^'"]*)['"]"#).unwrap()
});
// /cars/ab12-xyz, /vehicle/12345 — a whitelisted resource segment followed
// by a numeric or slug-shaped identifier token
static RESOURCE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:cars?|listings?|vehicles?|stock|used)/([A-Za-z0-9][A-Za-z0-9_-]*)")
        .unwrap()
});

const URL_KEYS: &[&str] = &["url", "href", "link", "permalink"];

fn plausible_identifier(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
        || (token.contains('-') && token.chars().any(|c| c.is_ascii_digit() || c.is_ascii_lowercase()))
}

fn looks_like_listing_path(s: &str) -> bool {
    RESOURCE_PATH_RE
        .captures(s)
        .is_some_and(|caps| plausible_identifier(&caps[1]))
}

/// Hosts considered ours: the page host with and without a www prefix.
fn same_host(candidate: &Url, page_url: &Url) -> bool {
    let strip = |h: &str| h.trim_start_matches("www.").to_string();
    match (candidate.host_str(), page_url.host_str()) {
        (Some(a), Some(b)) => strip(a) == strip(b),
        _ => false,
    }
}

fn json_blocks(doc: &Doc) -> Vec<String> {
    let mut blocks: Vec<String> = doc
        .html
        .select(&JSON_SCRIPT_SEL)
        .map(|tag| tag.text().collect::<String>())
        .filter(|t| !t.trim().is_empty())
        .collect();

    if blocks.is_empty() {
        for tag in doc.html.select(&SCRIPT_SEL) {
            let txt: String = tag.text().collect();
            let trimmed = txt.trim();
            if trimmed.starts_with('{')
                || trimmed.starts_with('[')
                || trimmed.contains("INITIAL_STATE")
                || trimmed.contains("window.__")
            {
                blocks.push(txt);
            }
        }
    }
    blocks
}

fn walk_strings<'a>(node: &'a Value, key: Option<&'a str>, out: &mut Vec<(Option<&'a str>, &'a str)>) {
    match node {
        Value::String(s) => out.push((key, s)),
        Value::Array(items) => {
            for item in items {
                walk_strings(item, None, out);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                walk_strings(v, Some(k.as_str()), out);
            }
        }
        _ => {}
    }
}

/// Mine structured JSON payloads for listing URLs. Absolute URLs are
/// restricted to the page's own host to avoid CDN/tracker false positives.
pub fn json_payload_links(doc: &Doc, page_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for block in json_blocks(doc) {
        let Some(data) = jsonld::parse_lenient(&block) else {
            continue;
        };
        let mut strings = Vec::new();
        walk_strings(&data, None, &mut strings);

        for (key, sval) in strings {
            if !(sval.starts_with('/') || sval.starts_with("http")) {
                continue;
            }
            let keyed = key.is_some_and(|k| URL_KEYS.contains(&k.to_lowercase().as_str()));
            if !keyed && !looks_like_listing_path(sval) {
                continue;
            }
            if let Ok(abs) = page_url.join(sval) {
                if sval.starts_with("http") && !same_host(&abs, page_url) {
                    continue;
                }
                if seen.insert(abs.to_string()) {
                    out.push(abs);
                }
            }
        }
    }
    out
}

/// AJAX/infinite-scroll listing scan: data-load attributes, client-fetch
/// call signatures in inline scripts, and load-more anchors.
pub fn ajax_links(doc: &Doc, page_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    // data-load-url / data-next / data-url style attributes
    for el in doc.html.select(&ANY_SEL) {
        for (name, value) in el.value().attrs() {
            let lower = name.to_lowercase();
            if ["data-load", "data-next", "data-url"]
                .iter()
                .any(|tok| lower.contains(tok))
                && !value.is_empty()
            {
                push_resolved(value, page_url, &mut seen, &mut out);
            }
        }
    }

    // fetch()/axios endpoints and heuristic XHR paths in script text
    for caps in FETCH_RE.captures_iter(&doc.raw) {
        push_resolved(&caps[1], page_url, &mut seen, &mut out);
    }
    for caps in AXIOS_RE.captures_iter(&doc.raw) {
        push_resolved(&caps[1], page_url, &mut seen, &mut out);
    }
    for caps in XHR_URL_RE.captures_iter(&doc.raw) {
        push_resolved(&caps[1], page_url, &mut seen, &mut out);
    }

    // load-more anchors
    for a in doc.html.select(&ANCHOR_SEL) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let text = a.text().collect::<String>().to_lowercase();
        let href_lower = href.to_lowercase();
        let text_hit = ["load", "more", "show more"].iter().any(|t| text.contains(t));
        let href_hit = ["page=", "/page/", "offset="]
            .iter()
            .any(|t| href_lower.contains(t));
        if text_hit || href_hit {
            push_resolved(href, page_url, &mut seen, &mut out);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://dealer.example.com/stock").unwrap()
    }

    #[test]
    fn json_payload_whitelisted_keys() {
        let doc = Doc::parse(
            r#"<script type="application/json">
            {"results": [{"url": "/cars/ford-focus-123"}, {"permalink": "/cars/vw-golf-77"}]}
            </script>"#,
        );
        let links = json_payload_links(&doc, &url());
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].as_str(), "https://dealer.example.com/cars/ford-focus-123");
    }

    #[test]
    fn json_payload_resource_path_heuristic() {
        let doc = Doc::parse(
            r#"<script type="application/json">
            {"items": ["/vehicle/98765", "/assets/logo.png"]}
            </script>"#,
        );
        let links = json_payload_links(&doc, &url());
        assert_eq!(links.len(), 1);
        assert!(links[0].as_str().ends_with("/vehicle/98765"));
    }

    #[test]
    fn json_payload_rejects_foreign_hosts() {
        let doc = Doc::parse(
            r#"<script type="application/json">
            {"url": "https://cdn.tracker.net/cars/abc-1", "href": "https://www.dealer.example.com/cars/def-2"}
            </script>"#,
        );
        let links = json_payload_links(&doc, &url());
        assert_eq!(links.len(), 1);
        assert!(links[0].as_str().contains("dealer.example.com"));
    }

    #[test]
    fn json_payload_tolerates_state_assignment() {
        let doc = Doc::parse(
            r#"<script>window.__INITIAL_STATE__ = {"stock": {"link": "/used/audi-a3-42"}};</script>"#,
        );
        assert_eq!(json_payload_links(&doc, &url()).len(), 1);
    }

    #[test]
    fn ajax_finds_fetch_and_data_attrs() {
        let doc = Doc::parse(
            r#"<div data-load-url="/api/stock?offset=20"></div>
               <script>fetch('/api/listings?page=2').then(r => r.json());</script>"#,
        );
        let links = ajax_links(&doc, &url());
        assert!(links.iter().any(|u| u.path() == "/api/stock"));
        assert!(links.iter().any(|u| u.path() == "/api/listings"));
    }

    #[test]
    fn ajax_finds_load_more_anchor() {
        let doc = Doc::parse(r#"<a href="/stock?page=2">Show more vehicles</a>"#);
        assert_eq!(ajax_links(&doc, &url()).len(), 1);
    }

    #[test]
    fn slug_without_digits_or_dash_rejected() {
        assert!(!looks_like_listing_path("/cars/about"));
        assert!(looks_like_listing_path("/cars/1234"));
        assert!(looks_like_listing_path("/cars/ford-focus"));
    }
}
