use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::Value;

use super::jsonld;
use super::normalize;

static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static DL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dl dt").unwrap());
static LABEL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".label").unwrap());
static VALUE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".value").unwrap());
static SPEC_ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".spec-row").unwrap());
static ITEMSCOPE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[itemscope]").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static META_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").unwrap());

/// A document parsed exactly once. Every strategy and the scorer work
/// from this instead of re-parsing the raw HTML.
pub struct Doc {
    pub raw: String,
    pub html: Html,
    pub jsonld: Vec<Value>,
}

impl Doc {
    pub fn parse(raw: &str) -> Self {
        let html = Html::parse_document(raw);
        let jsonld = jsonld::decode_blocks(&html);
        Doc {
            raw: raw.to_string(),
            html,
            jsonld,
        }
    }

    /// First meta content matching `property` then `name`.
    pub fn meta(&self, property: Option<&str>, name: Option<&str>) -> Option<String> {
        let find = |attr: &str, wanted: &str| {
            self.html
                .select(&META_SEL)
                .find(|m| m.value().attr(attr) == Some(wanted))
                .and_then(|m| m.value().attr("content"))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        if let Some(p) = property {
            if let Some(v) = find("property", p) {
                return Some(v);
            }
        }
        if let Some(n) = name {
            if let Some(v) = find("name", n) {
                return Some(v);
            }
        }
        None
    }

    pub fn title(&self) -> Option<String> {
        self.html
            .select(&TITLE_SEL)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// First item-scoped element whose declared type mentions "vehicle".
    pub fn vehicle_microdata_scope(&self) -> Option<ElementRef<'_>> {
        self.html.select(&ITEMSCOPE_SEL).find(|el| {
            el.value()
                .attr("itemtype")
                .is_some_and(|t| t.to_lowercase().contains("vehicle"))
        })
    }
}

/// Per-document feature bag, recomputed for every classification call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignalSet {
    pub has_table: bool,
    pub has_structured_vehicle_object: bool,
    pub has_label_value_pairs: bool,
    pub has_microdata: bool,
    pub has_price_meta: bool,
    pub has_title_year: bool,
    pub has_org_object: bool,
    /// Filled in by the scorer, which probes the listing strategies.
    pub discovered_listing_link_count: usize,
}

impl SignalSet {
    pub fn compute(doc: &Doc) -> Self {
        let has_label_value_pairs = doc.html.select(&DL_SEL).next().is_some()
            || (doc.html.select(&LABEL_SEL).next().is_some()
                && doc.html.select(&VALUE_SEL).next().is_some())
            || doc.html.select(&SPEC_ROW_SEL).next().is_some();

        let title = doc
            .meta(Some("og:title"), Some("title"))
            .or_else(|| doc.title());

        SignalSet {
            has_table: doc.html.select(&TABLE_SEL).next().is_some(),
            has_structured_vehicle_object: doc.jsonld.iter().any(jsonld::is_vehicle),
            has_label_value_pairs,
            has_microdata: doc.vehicle_microdata_scope().is_some(),
            has_price_meta: doc
                .meta(Some("product:price:amount"), Some("price"))
                .is_some(),
            has_title_year: title
                .as_deref()
                .and_then(normalize::parse_year)
                .is_some(),
            has_org_object: doc.jsonld.iter().any(jsonld::is_organization),
            discovered_listing_link_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_page_signals() {
        let html = r#"
            <html><head>
              <title>2018 Sample S-Model for sale</title>
              <meta property="product:price:amount" content="12995">
              <script type="application/ld+json">{"@type": "Vehicle", "name": "X"}</script>
            </head><body>
              <table><tr><th>Mileage</th><td>12,000 miles</td></tr></table>
              <div class="label">Fuel</div><div class="value">Petrol</div>
            </body></html>"#;
        let doc = Doc::parse(html);
        let s = SignalSet::compute(&doc);
        assert!(s.has_table);
        assert!(s.has_structured_vehicle_object);
        assert!(s.has_label_value_pairs);
        assert!(s.has_price_meta);
        assert!(s.has_title_year);
        assert!(!s.has_org_object);
        assert!(!s.has_microdata);
    }

    #[test]
    fn empty_page_has_no_signals() {
        let doc = Doc::parse("<html><body><p>hello</p></body></html>");
        let s = SignalSet::compute(&doc);
        assert!(!s.has_table);
        assert!(!s.has_structured_vehicle_object);
        assert!(!s.has_label_value_pairs);
        assert!(!s.has_microdata);
        assert!(!s.has_price_meta);
        assert!(!s.has_title_year);
        assert!(!s.has_org_object);
    }

    #[test]
    fn microdata_scope_found() {
        let doc = Doc::parse(
            r#"<div itemscope itemtype="https://schema.org/Vehicle">
                 <span itemprop="name">2018 Sample</span>
               </div>"#,
        );
        assert!(SignalSet::compute(&doc).has_microdata);
    }
}
