use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

// Tolerates one level of `window.__STATE__ = {...}` assignment wrapping
static ASSIGNMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\s*(\{[\s\S]+\})").unwrap());

static LD_SCRIPT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// Exact whitelist of structured-data vehicle type names (local, lowercased).
const VEHICLE_TYPES: &[&str] = &["vehicle", "car", "automobile", "vehiclemodel"];

/// Decode every linked-data script block into flat objects.
///
/// Malformed blocks are skipped per-block (logged at debug); top-level
/// arrays and `@graph` containers are flattened into individual objects.
pub fn decode_blocks(html: &Html) -> Vec<Value> {
    let mut out = Vec::new();
    for tag in html.select(&LD_SCRIPT_SEL) {
        let raw: String = tag.text().collect();
        let raw = unescape_entities(&raw);
        match parse_lenient(&raw) {
            Some(data) => flatten_into(data, &mut out),
            None => debug!("skipping malformed JSON-LD block"),
        }
    }
    out
}

/// Parse a script body as JSON, tolerating an assignment wrapper.
pub fn parse_lenient(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    let caps = ASSIGNMENT_RE.captures(trimmed)?;
    serde_json::from_str::<Value>(&caps[1]).ok()
}

fn flatten_into(data: Value, out: &mut Vec<Value>) {
    match data {
        Value::Array(items) => {
            for item in items {
                if item.is_object() {
                    flatten_into(item, out);
                }
            }
        }
        Value::Object(ref map) => {
            if let Some(Value::Array(graph)) = map.get("@graph") {
                for node in graph {
                    if node.is_object() {
                        out.push(node.clone());
                    }
                }
            } else {
                out.push(data);
            }
        }
        _ => {}
    }
}

/// Type names declared on an object, normalized to the local name
/// (last segment after `/` and `#`) and lowercased.
pub fn type_names(obj: &Value) -> Vec<String> {
    let Some(t) = obj.get("@type") else {
        return Vec::new();
    };
    let raw: Vec<&str> = match t {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(|v| v.as_str()).collect(),
        _ => Vec::new(),
    };
    raw.iter().map(|s| local_name(s)).collect()
}

fn local_name(s: &str) -> String {
    let after_slash = s.rsplit('/').next().unwrap_or(s);
    let after_hash = after_slash.rsplit('#').next().unwrap_or(after_slash);
    after_hash.to_lowercase()
}

/// Exact vehicle-type membership test. Guards against substring false
/// positives (a stringified array is a single non-matching name).
pub fn is_vehicle(obj: &Value) -> bool {
    type_names(obj)
        .iter()
        .any(|name| VEHICLE_TYPES.contains(&name.as_str()))
}

/// Organization-type test for site/dealer pages. Covers subtypes like
/// SportsOrganization and the automotive business vocabulary.
pub fn is_organization(obj: &Value) -> bool {
    type_names(obj).iter().any(|name| {
        name.ends_with("organization") || name == "automotivebusiness" || name == "autodealer"
    })
}

/// Minimal HTML entity unescape for escaped JSON payloads.
fn unescape_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
