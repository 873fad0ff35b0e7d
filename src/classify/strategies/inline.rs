use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use serde_json::{Map, Value};

use crate::classify::signals::Doc;

use super::tabular::{self, cell_text, record_pair, SpecScan};

static DT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dl dt").unwrap());
static LABEL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".label").unwrap());
static VALUE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".value").unwrap());
static SPEC_ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".spec-row").unwrap());
static SPEC_LABEL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".spec, th").unwrap());
static SPEC_VALUE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".value, td").unwrap());

fn next_sibling_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Scan definition lists, `.label`/`.value` siblings and `.spec-row`
/// containers into one spec map.
pub fn scan_inline_pairs(doc: &Doc) -> SpecScan {
    let mut out = SpecScan::default();

    // dl: each dt pairs with its next dd sibling
    for dt in doc.html.select(&DT_SEL) {
        let Some(dd) = next_sibling_element(dt).filter(|el| el.value().name() == "dd") else {
            continue;
        };
        let key = cell_text(dt);
        if !key.is_empty() {
            record_pair(&mut out, &key, cell_text(dd));
        }
    }

    // .label followed by a .value sibling, or a .value within the parent
    for label in doc.html.select(&LABEL_SEL) {
        let value = next_sibling_element(label)
            .filter(|el| has_class(*el, "value"))
            .or_else(|| {
                label
                    .parent()
                    .and_then(ElementRef::wrap)
                    .and_then(|p| p.select(&VALUE_SEL).next())
            });
        let Some(value) = value else { continue };
        let key = cell_text(label);
        if !key.is_empty() {
            record_pair(&mut out, &key, cell_text(value));
        }
    }

    // row-style containers
    for row in doc.html.select(&SPEC_ROW_SEL) {
        let Some(label) = row.select(&SPEC_LABEL_SEL).next() else {
            continue;
        };
        let Some(value) = row.select(&SPEC_VALUE_SEL).next() else {
            continue;
        };
        let key = cell_text(label);
        if !key.is_empty() {
            record_pair(&mut out, &key, cell_text(value));
        }
    }

    out
}

/// Microdata fallback: first item-scoped element whose declared type
/// mentions "vehicle". Meta-like tags prefer their content attribute.
pub fn microdata_scan(doc: &Doc) -> Option<Map<String, Value>> {
    let scope = doc.vehicle_microdata_scope()?;

    let itemprop = |prop: &str| -> Option<String> {
        let sel = Selector::parse(&format!(r#"[itemprop="{prop}"]"#)).ok()?;
        let node = scope.select(&sel).next()?;
        let text = node
            .value()
            .attr("content")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| cell_text(node));
        (!text.is_empty()).then_some(text)
    };

    let mut out = Map::new();
    out.insert("_source".into(), Value::String("microdata-fallback".into()));
    for prop in ["name", "brand", "model", "description"] {
        if let Some(v) = itemprop(prop) {
            out.insert(prop.to_string(), Value::String(v));
        }
    }
    if let Some(price) = itemprop("price") {
        out.insert("price_raw".into(), Value::String(price));
    }
    if let Some(mileage) = itemprop("mileageFromOdometer").or_else(|| itemprop("mileage")) {
        out.insert("mileage".into(), Value::String(mileage));
    }
    if let Some(year) = itemprop("vehicleModelYear").or_else(|| itemprop("year")) {
        out.insert("year".into(), Value::String(year));
    }

    (out.len() > 1).then_some(out)
}

/// Meta-tag fallback: Open Graph / standard meta price, title, description.
pub fn meta_scan(doc: &Doc) -> Option<Map<String, Value>> {
    let title = doc
        .meta(Some("og:title"), Some("title"))
        .or_else(|| doc.title());
    let price = doc.meta(Some("product:price:amount"), Some("price"));
    let currency = doc.meta(Some("product:price:currency"), Some("currency"));
    let description = doc.meta(Some("og:description"), Some("description"));

    if price.is_none() && title.is_none() {
        return None;
    }

    let mut out = Map::new();
    out.insert("_source".into(), Value::String("meta-fallback".into()));
    if let Some(t) = title {
        out.insert("title".into(), Value::String(t.clone()));
        out.insert("name".into(), Value::String(t));
    }
    if let Some(p) = price {
        out.insert("price_raw".into(), Value::String(p));
    }
    if let Some(c) = currency {
        out.insert("currency".into(), Value::String(c));
    }
    if let Some(d) = description {
        out.insert("description".into(), Value::String(d));
    }
    Some(out)
}

/// Inline Blocks detail strategy: inline pairs first, then the
/// microdata and meta fallbacks in order.
pub fn detail(doc: &Doc) -> Option<Map<String, Value>> {
    let scan = scan_inline_pairs(doc);
    if scan.specs.is_empty() {
        return microdata_scan(doc).or_else(|| meta_scan(doc));
    }

    let mut out = Map::new();
    out.insert("_source".into(), Value::String("inline-blocks".into()));
    if let Some(m) = &scan.mileage {
        out.insert("mileage".into(), Value::String(m.clone()));
    }
    if let Some(f) = &scan.fuel {
        out.insert("fuel".into(), Value::String(f.clone()));
    }
    if let Some(t) = &scan.transmission {
        out.insert("transmission".into(), Value::String(t.clone()));
    }
    out.insert("specs".into(), Value::Object(scan.specs));
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_list_pairs() {
        let doc = Doc::parse(
            r#"<dl>
                 <dt>Mileage</dt><dd>12,000 miles</dd>
                 <dt>Fuel</dt><dd>Diesel</dd>
               </dl>"#,
        );
        let scan = scan_inline_pairs(&doc);
        assert_eq!(scan.specs["mileage"], "12,000 miles");
        assert_eq!(scan.fuel.as_deref(), Some("Diesel"));
    }

    #[test]
    fn label_value_siblings() {
        let doc = Doc::parse(
            r#"<div class="label">Year</div><div class="value">2018</div>"#,
        );
        let scan = scan_inline_pairs(&doc);
        assert_eq!(scan.specs["year"], "2018");
    }

    #[test]
    fn label_value_within_parent() {
        let doc = Doc::parse(
            r#"<div><span class="label">Transmission</span>
                    <em>noise</em><span class="value">Automatic</span></div>"#,
        );
        let scan = scan_inline_pairs(&doc);
        assert_eq!(scan.specs["transmission"], "Automatic");
        assert_eq!(scan.transmission.as_deref(), Some("Automatic"));
    }

    #[test]
    fn spec_row_containers() {
        let doc = Doc::parse(
            r#"<div class="spec-row"><span class="spec">Mileage</span>
                    <span class="value">18k</span></div>"#,
        );
        let scan = scan_inline_pairs(&doc);
        assert_eq!(scan.mileage.as_deref(), Some("18k"));
    }

    #[test]
    fn falls_back_to_microdata() {
        let doc = Doc::parse(
            r#"<div itemscope itemtype="https://schema.org/Vehicle">
                 <span itemprop="name">2016 Sample</span>
                 <meta itemprop="price" content="7995">
               </div>"#,
        );
        let out = detail(&doc).unwrap();
        assert_eq!(out["_source"], "microdata-fallback");
        assert_eq!(out["name"], "2016 Sample");
        assert_eq!(out["price_raw"], "7995");
    }

    #[test]
    fn falls_back_to_meta() {
        let doc = Doc::parse(
            r#"<head>
                 <meta property="og:title" content="2015 Thing">
                 <meta property="product:price:amount" content="3995">
               </head><body></body>"#,
        );
        let out = detail(&doc).unwrap();
        assert_eq!(out["_source"], "meta-fallback");
        assert_eq!(out["price_raw"], "3995");
    }

    #[test]
    fn nothing_found_is_none() {
        let doc = Doc::parse("<p>plain</p>");
        assert!(detail(&doc).is_none());
    }

    #[test]
    fn inline_spec_key_reuses_table_normalization() {
        assert_eq!(tabular::spec_key("Fuel  Type"), "fuel_type");
    }
}
