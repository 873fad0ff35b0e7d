use serde::Serialize;
use serde_json::{Map, Value};

use super::normalize;

/// Page archetype. Priority order matters for scorer tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Detail,
    Listing,
    Pagination,
    SiteInfo,
    None,
}

impl Category {
    pub fn priority(self) -> u8 {
        match self {
            Category::Detail => 4,
            Category::Listing => 3,
            Category::Pagination => 2,
            Category::SiteInfo => 1,
            Category::None => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Detail => "detail",
            Category::Listing => "listing",
            Category::Pagination => "pagination",
            Category::SiteInfo => "site_info",
            Category::None => "none",
        }
    }
}

/// Canonical detail record: the fixed key set is always present, with
/// nulls standing in for absent data. Strategy diagnostics survive in
/// `extras` and flatten into the serialized object.
#[derive(Debug, Clone, Serialize)]
pub struct DetailRecord {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub price_value: Option<f64>,
    pub price_raw: Option<String>,
    pub currency: Option<String>,
    pub mileage_value: Option<i64>,
    pub mileage_unit: Option<String>,
    pub fuel: Option<String>,
    pub transmission: Option<String>,
    pub description: Option<String>,
    pub raw: Option<Value>,
    #[serde(rename = "_source")]
    pub source: String,
    pub confidence: f64,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

pub const CANONICAL_KEYS: &[&str] = &[
    "brand",
    "model",
    "year",
    "price_value",
    "price_raw",
    "currency",
    "mileage_value",
    "mileage_unit",
    "fuel",
    "transmission",
    "description",
    "raw",
];

#[derive(Debug, Clone, Serialize)]
pub struct SiteInfoRecord {
    pub name: Option<String>,
    pub telephone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub raw: Option<Value>,
}

/// Per-document classification output (external interface shape).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOutcome {
    pub sample_id: String,
    pub strategy_name: Option<&'static str>,
    pub category: Category,
    pub detail_record: Option<DetailRecord>,
    pub site_info_record: Option<SiteInfoRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_links: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Value>,
}

/// Merge a detail strategy's raw output into the canonical record.
///
/// Values already present copy through; canonical fields still absent are
/// normalized from the best available raw text (explicit price_raw/mileage
/// fields, then spec-map entries). Extra diagnostic keys are kept.
pub fn assemble_detail(source: &str, mut rawmap: Map<String, Value>) -> DetailRecord {
    let source = rawmap
        .remove("_source")
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| source.to_string());

    let raw = ["raw", "_raw", "_raw_jsonld", "_raw_vehicle"]
        .iter()
        .find_map(|k| rawmap.remove(*k))
        .filter(|v| !v.is_null())
        .or_else(|| rawmap.get("specs").cloned().filter(|v| !v.is_null()));

    let specs = rawmap.get("specs").and_then(|v| v.as_object()).cloned();
    let spec_text = |key: &str| -> Option<String> {
        specs
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    let take_str = |map: &mut Map<String, Value>, key: &str| -> Option<String> {
        match map.remove(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => {
                // keep non-string oddities visible rather than dropping them
                map.insert(key.to_string(), other);
                None
            }
        }
    };

    let brand = take_str(&mut rawmap, "brand")
        .or_else(|| spec_text("brand").or_else(|| spec_text("make")))
        .and_then(|b| normalize::normalize_brand(&b));
    let model = take_str(&mut rawmap, "model").or_else(|| spec_text("model"));
    let description = take_str(&mut rawmap, "description")
        .or_else(|| take_str(&mut rawmap, "desc"))
        .or_else(|| spec_text("description"));
    let fuel = take_str(&mut rawmap, "fuel").or_else(|| spec_text("fuel"));
    let transmission =
        take_str(&mut rawmap, "transmission").or_else(|| spec_text("transmission"));

    // Year: explicit numeric wins, then freeform fields
    let year = rawmap
        .remove("year")
        .and_then(|v| match v {
            Value::Number(n) => n.as_i64().map(|y| y as i32),
            Value::String(s) => normalize::parse_year(&s),
            _ => None,
        })
        .or_else(|| {
            let name_text = rawmap
                .get("name")
                .or_else(|| rawmap.get("title"))
                .and_then(|v| v.as_str());
            name_text
                .and_then(normalize::parse_year)
                .or_else(|| spec_text("year").as_deref().and_then(normalize::parse_year))
        });

    // Price: explicit value, then numeric "price", then parse raw text
    let mut currency = take_str(&mut rawmap, "currency");
    let explicit_value = rawmap.remove("price_value").and_then(|v| v.as_f64());
    let price_field = rawmap.remove("price");
    let price_raw = take_str(&mut rawmap, "price_raw")
        .or_else(|| match &price_field {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .or_else(|| spec_text("price"));
    let price_value = explicit_value
        .or_else(|| match &price_field {
            Some(Value::Number(n)) => n.as_f64(),
            _ => None,
        })
        .or_else(|| {
            price_raw.as_deref().and_then(|txt| {
                let (amount, cur) = normalize::parse_price(txt);
                if currency.is_none() {
                    currency = cur;
                }
                amount
            })
        });

    // Mileage: explicit value, then freeform mileage text, then specs
    let explicit_mileage = rawmap.remove("mileage_value").and_then(|v| v.as_i64());
    let mut mileage_unit = take_str(&mut rawmap, "mileage_unit");
    let mileage_text = match rawmap.get("mileage") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
    .or_else(|| spec_text("mileage"));
    let mileage_value = explicit_mileage.or_else(|| {
        mileage_text.as_deref().and_then(|txt| {
            let (value, unit) = normalize::parse_mileage(txt);
            if value.is_some() {
                mileage_unit = unit;
            }
            value
        })
    });

    // Confidence is monotonic in populated core fields {brand, model, price}
    let core = [
        brand.is_some(),
        model.is_some(),
        price_value.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    let confidence = (core as f64 / 3.0 * 100.0).round() / 100.0;
    rawmap.remove("confidence");

    DetailRecord {
        brand,
        model,
        year,
        price_value,
        price_raw,
        currency,
        mileage_value,
        mileage_unit,
        fuel,
        transmission,
        description,
        raw,
        source,
        confidence,
        extras: rawmap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn canonical_keys_always_serialized() {
        let record = assemble_detail("detail_jsonld_vehicle", Map::new());
        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();
        for key in CANONICAL_KEYS {
            assert!(obj.contains_key(*key), "missing canonical key {key}");
            assert!(obj[*key].is_null());
        }
        assert_eq!(obj["_source"], "detail_jsonld_vehicle");
        assert_eq!(obj["confidence"], 0.0);
    }

    #[test]
    fn price_parsed_from_raw_text() {
        let record = assemble_detail(
            "x",
            map(json!({"price_raw": "£12,995", "name": "2018 Sample S-Model"})),
        );
        assert_eq!(record.price_value, Some(12995.0));
        assert_eq!(record.currency.as_deref(), Some("GBP"));
        assert_eq!(record.year, Some(2018));
    }

    #[test]
    fn mileage_pulled_from_spec_map() {
        let record = assemble_detail(
            "x",
            map(json!({"specs": {"mileage": "30,000 miles", "fuel": "Petrol"}})),
        );
        assert_eq!(record.mileage_value, Some(30000));
        assert_eq!(record.mileage_unit.as_deref(), Some("miles"));
        assert_eq!(record.fuel.as_deref(), Some("Petrol"));
        // specs survive as the raw payload
        assert!(record.raw.is_some());
    }

    #[test]
    fn confidence_counts_core_fields() {
        let r = assemble_detail("x", map(json!({"brand": "Ford"})));
        assert_eq!(r.confidence, 0.33);
        let r = assemble_detail("x", map(json!({"brand": "Ford", "model": "Focus"})));
        assert_eq!(r.confidence, 0.67);
        let r = assemble_detail(
            "x",
            map(json!({"brand": "Ford", "model": "Focus", "price": 4995})),
        );
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn extras_are_preserved() {
        let record = assemble_detail("x", map(json!({"name": "2018 Thing", "images": ["a"]})));
        assert!(record.extras.contains_key("name"));
        assert!(record.extras.contains_key("images"));
    }

    #[test]
    fn explicit_values_copy_through() {
        let record = assemble_detail(
            "x",
            map(json!({
                "brand": "SampleBrand",
                "model": "S-Model",
                "price_value": 12995.0,
                "mileage_value": 30000,
                "mileage_unit": "miles",
                "year": 2018
            })),
        );
        assert_eq!(record.brand.as_deref(), Some("SampleBrand"));
        assert_eq!(record.model.as_deref(), Some("S-Model"));
        assert_eq!(record.price_value, Some(12995.0));
        assert_eq!(record.mileage_value, Some(30000));
        assert_eq!(record.year, Some(2018));
        assert_eq!(record.confidence, 1.0);
    }
}
