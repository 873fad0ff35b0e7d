use serde_json::{Map, Value};

use crate::classify::jsonld;
use crate::classify::normalize;
use crate::classify::signals::Doc;

use super::{inline, tabular};

/// First structured-data object passing the exact vehicle-type test.
pub fn first_vehicle(doc: &Doc) -> Option<&Value> {
    doc.jsonld.iter().find(|o| jsonld::is_vehicle(o))
}

/// Freeform text from a JSON-LD node: strings pass through, objects
/// yield their name/@value.
fn node_text(node: Option<&Value>) -> Option<String> {
    match node? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Object(map) => node_text(map.get("name").or_else(|| map.get("@value"))),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn offers_of(vehicle: &Value) -> Option<&Value> {
    match vehicle.get("offers") {
        Some(Value::Array(items)) => items.first(),
        Some(other) => Some(other),
        None => None,
    }
}

fn core_fields(vehicle: &Value, out: &mut Map<String, Value>) {
    let brand = node_text(
        vehicle
            .get("brand")
            .or_else(|| vehicle.get("manufacturer"))
            .or_else(|| vehicle.get("make")),
    );
    let model = node_text(vehicle.get("model").or_else(|| vehicle.get("vehicleModel")));
    let name = node_text(vehicle.get("name"));
    let description = node_text(vehicle.get("description"));

    let offers = offers_of(vehicle);
    let price_raw = node_text(
        offers
            .and_then(|o| o.get("price"))
            .or_else(|| vehicle.get("price")),
    );
    let currency = node_text(offers.and_then(|o| o.get("priceCurrency")));

    if let Some(b) = brand {
        out.insert("brand".into(), Value::String(b));
    }
    if let Some(m) = model {
        out.insert("model".into(), Value::String(m));
    }
    if let Some(d) = description {
        out.insert("description".into(), Value::String(d));
    }
    if let Some(p) = price_raw {
        let (amount, parsed_cur) = normalize::parse_price(&p);
        out.insert("price_raw".into(), Value::String(p));
        if let Some(a) = amount {
            out.insert("price_value".into(), Value::from(a));
        }
        let cur = currency.or(parsed_cur);
        if let Some(c) = cur {
            out.insert("currency".into(), Value::String(c));
        }
    } else if let Some(c) = currency {
        out.insert("currency".into(), Value::String(c));
    }
    if let Some(n) = &name {
        if let Some(y) = normalize::parse_year(n) {
            out.insert("year".into(), Value::from(y));
        }
        out.insert("name".into(), Value::String(n.clone()));
    }
}

/// Structured-Data Vehicle detail strategy. Falls back to the microdata
/// then meta scans when no vehicle object is present.
pub fn jsonld_detail(doc: &Doc) -> Option<Map<String, Value>> {
    if let Some(vehicle) = first_vehicle(doc) {
        let mut out = Map::new();
        out.insert("_source".into(), Value::String("json-ld".into()));
        out.insert("_raw".into(), vehicle.clone());
        core_fields(vehicle, &mut out);
        return Some(out);
    }

    if let Some(micro) = inline::microdata_scan(doc) {
        return Some(micro);
    }
    inline::meta_scan(doc)
}

/// Hybrid detail strategy: structured-data core fields first, then the
/// table scan fills mileage/fuel/transmission gaps. Fields already set
/// by structured data win.
pub fn hybrid_detail(doc: &Doc) -> Option<Map<String, Value>> {
    let vehicle = first_vehicle(doc);
    let scan = tabular::scan_tables(doc);
    if vehicle.is_none() && scan.specs.is_empty() {
        return None;
    }

    let mut out = Map::new();
    out.insert("_source".into(), Value::String("hybrid".into()));
    if let Some(v) = vehicle {
        out.insert("_raw_jsonld".into(), v.clone());
        core_fields(v, &mut out);
    }

    if let Some(m) = &scan.mileage {
        out.entry("mileage").or_insert(Value::String(m.clone()));
    }
    if let Some(f) = &scan.fuel {
        out.entry("fuel").or_insert(Value::String(f.clone()));
    }
    if let Some(t) = &scan.transmission {
        out.entry("transmission").or_insert(Value::String(t.clone()));
    }
    if !scan.specs.is_empty() {
        out.insert("specs".into(), Value::Object(scan.specs));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VEHICLE_PAGE: &str = r#"
        <html><head>
        <script type="application/ld+json">
        {
          "@type": "Vehicle",
          "name": "2018 SampleBrand S-Model",
          "brand": {"name": "SampleBrand"},
          "model": "S-Model",
          "description": "One careful owner",
          "offers": {"price": "12995", "priceCurrency": "GBP"}
        }
        </script>
        </head><body>
        <table><tr><th>Mileage</th><td>30,000 miles</td></tr>
               <tr><th>Fuel</th><td>Petrol</td></tr></table>
        </body></html>"#;

    #[test]
    fn jsonld_extracts_core_fields() {
        let doc = Doc::parse(VEHICLE_PAGE);
        let out = jsonld_detail(&doc).unwrap();
        assert_eq!(out["brand"], "SampleBrand");
        assert_eq!(out["model"], "S-Model");
        assert_eq!(out["price_value"], 12995.0);
        assert_eq!(out["currency"], "GBP");
        assert_eq!(out["year"], 2018);
        assert_eq!(out["_source"], "json-ld");
    }

    #[test]
    fn offers_list_takes_first_element() {
        let doc = Doc::parse(
            r#"<script type="application/ld+json">
            {"@type": "Car", "name": "X", "offers": [{"price": "£4,995"}, {"price": "1"}]}
            </script>"#,
        );
        let out = jsonld_detail(&doc).unwrap();
        assert_eq!(out["price_value"], 4995.0);
        assert_eq!(out["currency"], "GBP");
    }

    #[test]
    fn hybrid_merges_table_gaps() {
        let doc = Doc::parse(VEHICLE_PAGE);
        let out = hybrid_detail(&doc).unwrap();
        assert_eq!(out["brand"], "SampleBrand");
        assert_eq!(out["mileage"], "30,000 miles");
        assert_eq!(out["fuel"], "Petrol");
        assert_eq!(out["_source"], "hybrid");
    }

    #[test]
    fn hybrid_prefers_structured_fields() {
        let doc = Doc::parse(
            r#"<script type="application/ld+json">
            {"@type": "Vehicle", "name": "X", "fuel": "ignored"}
            </script>
            <table><tr><th>Fuel</th><td>Diesel</td></tr></table>"#,
        );
        let out = hybrid_detail(&doc).unwrap();
        // structured data set no fuel, so the table fills it
        assert_eq!(out["fuel"], "Diesel");
    }

    #[test]
    fn hybrid_without_any_signal_is_none() {
        let doc = Doc::parse("<p>plain page</p>");
        assert!(hybrid_detail(&doc).is_none());
    }

    #[test]
    fn top_level_price_without_offers() {
        let doc = Doc::parse(
            r#"<script type="application/ld+json">
            {"@type": "Automobile", "name": "Y", "price": 995}
            </script>"#,
        );
        let out = jsonld_detail(&doc).unwrap();
        assert_eq!(out["price_value"], 995.0);
    }
}
