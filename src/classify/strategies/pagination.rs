use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use url::Url;

use crate::classify::signals::Doc;

static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static REL_NEXT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bnext\b").unwrap());
static PAGE_QUERY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[?&]page=\d+").unwrap());
static PAGE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)/page/\d+").unwrap());

/// rel=next anchor, tolerating multi-token rel values ("next prev").
fn rel_next(doc: &Doc, page_url: &Url) -> Option<Url> {
    doc.html
        .select(&ANCHOR_SEL)
        .find(|a| a.value().attr("rel").is_some_and(|r| REL_NEXT_RE.is_match(r)))
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
}

fn first_matching_href(doc: &Doc, page_url: &Url, pattern: &Regex) -> Option<Url> {
    doc.html
        .select(&ANCHOR_SEL)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| pattern.is_match(href))
        .and_then(|href| page_url.join(href).ok())
}

/// Query-parameter pagination: rel=next, else a `page=N` query link.
pub fn next_by_query(doc: &Doc, page_url: &Url) -> Option<Url> {
    rel_next(doc, page_url).or_else(|| first_matching_href(doc, page_url, &PAGE_QUERY_RE))
}

/// Path-segment pagination: rel=next, else a `/page/N` path link.
pub fn next_by_path(doc: &Doc, page_url: &Url) -> Option<Url> {
    rel_next(doc, page_url).or_else(|| first_matching_href(doc, page_url, &PAGE_PATH_RE))
}
