use std::sync::LazyLock;

use scraper::Selector;
use serde_json::{Map, Value};

use crate::classify::signals::Doc;

static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Spec map gathered from table rows, with the common first-class fields
/// surfaced by substring match on the raw header text.
#[derive(Debug, Default)]
pub struct SpecScan {
    pub specs: Map<String, Value>,
    pub mileage: Option<String>,
    pub fuel: Option<String>,
    pub transmission: Option<String>,
}

/// Scan every table's header/data cell pairs into a spec map keyed by
/// the lowercase-with-underscores header text.
pub fn scan_tables(doc: &Doc) -> SpecScan {
    let mut out = SpecScan::default();
    for table in doc.html.select(&TABLE_SEL) {
        for row in table.select(&ROW_SEL) {
            let Some(th) = row.select(&TH_SEL).next() else {
                continue;
            };
            let Some(td) = row.select(&TD_SEL).next() else {
                continue;
            };
            let key = cell_text(th);
            let val = cell_text(td);
            if key.is_empty() {
                continue;
            }
            record_pair(&mut out, &key, val);
        }
    }
    out
}

pub(super) fn record_pair(out: &mut SpecScan, key: &str, val: String) {
    let lower = key.to_lowercase();
    if lower.contains("mileage") && out.mileage.is_none() {
        out.mileage = Some(val.clone());
    }
    if lower.contains("fuel") && out.fuel.is_none() {
        out.fuel = Some(val.clone());
    }
    if lower.contains("transmission") && out.transmission.is_none() {
        out.transmission = Some(val.clone());
    }
    out.specs.insert(spec_key(key), Value::String(val));
}

/// Lowercase, non-alphanumerics collapsed to single underscores.
pub(super) fn spec_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut last_underscore = true;
    for c in key.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

pub(super) fn cell_text(el: scraper::ElementRef<'_>) -> String {
    el.text()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Detail capability: the spec map plus surfaced first-class fields.
pub fn detail(doc: &Doc) -> Option<Map<String, Value>> {
    let scan = scan_tables(doc);
    if scan.specs.is_empty() {
        return None;
    }

    let mut out = Map::new();
    out.insert("_source".into(), Value::String("html-spec-table".into()));
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
    fn scans_header_data_pairs() {
        let doc = Doc::parse(
            r#"<table>
                 <tr><th>Mileage</th><td>30,000 miles</td></tr>
                 <tr><th>Fuel Type</th><td>Petrol</td></tr>
                 <tr><th>Transmission</th><td>Manual</td></tr>
                 <tr><td>no header</td></tr>
               </table>"#,
        );
        let scan = scan_tables(&doc);
        assert_eq!(scan.specs["mileage"], "30,000 miles");
        assert_eq!(scan.specs["fuel_type"], "Petrol");
        assert_eq!(scan.mileage.as_deref(), Some("30,000 miles"));
        assert_eq!(scan.fuel.as_deref(), Some("Petrol"));
        assert_eq!(scan.transmission.as_deref(), Some("Manual"));
    }

    #[test]
    fn spec_key_normalization() {
        assert_eq!(spec_key("Fuel Type"), "fuel_type");
        assert_eq!(spec_key("  Engine  Size (cc) "), "engine_size_cc");
        assert_eq!(spec_key("MPG"), "mpg");
    }

    #[test]
    fn empty_page_yields_no_detail() {
        let doc = Doc::parse("<html><body><p>nothing</p></body></html>");
        assert!(detail(&doc).is_none());
    }

    #[test]
    fn detail_surfaces_first_class_fields() {
        let doc = Doc::parse(
            "<table><tr><th>Mileage</th><td>18k</td></tr></table>",
        );
        let out = detail(&doc).unwrap();
        assert_eq!(out["mileage"], "18k");
        assert_eq!(out["_source"], "html-spec-table");
    }
}
