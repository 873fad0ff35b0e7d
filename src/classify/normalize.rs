use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;

static CURRENCY_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(GBP|USD|EUR|AUD|CAD|JPY|CHF)\b").unwrap());
static KM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bkm\b|kilomet").unwrap());
static MILEAGE_UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(kilometres?|kilometers?|km|miles?|mi)\b").unwrap());
static MILEAGE_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9][0-9,\.k]*)\s*[-–—]\s*([0-9][0-9,\.k]*)").unwrap());
static MILEAGE_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9][0-9,\.]*)\s*(k)?").unwrap());
static YEAR4_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());
static YEAR2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{2})\b").unwrap());

const KM_TO_MILES: f64 = 0.621371;

const BRAND_ALIASES: &[(&str, &str)] = &[
    ("vw", "Volkswagen"),
    ("volkswagen", "Volkswagen"),
    ("mini", "MINI"),
    ("bmw", "BMW"),
    ("ford", "Ford"),
    ("toyota", "Toyota"),
];

/// Parse a freeform price string into (amount, currency).
///
/// Currency comes from a 3-letter code anywhere in the text or a leading
/// symbol. Unparseable amounts yield None while the currency may survive.
pub fn parse_price(txt: &str) -> (Option<f64>, Option<String>) {
    let s = txt.trim();
    if s.is_empty() {
        return (None, None);
    }

    let mut currency = CURRENCY_CODE_RE
        .captures(s)
        .map(|c| c[1].to_uppercase());
    if currency.is_none() {
        currency = match s.chars().next() {
            Some('£') => Some("GBP".to_string()),
            Some('$') => Some("USD".to_string()),
            Some('€') => Some("EUR".to_string()),
            _ => None,
        };
    }

    // Strip symbols, letters and thousands separators; keep digits/dot/minus
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let amount = cleaned.parse::<f64>().ok().filter(|a| a.is_finite());

    (amount, currency)
}

/// Parse a freeform mileage string into (value_in_miles, unit).
///
/// Accepts thousands separators, a trailing "k" shorthand, hyphenated
/// ranges (lower bound wins, a right-side "k" propagates left), and a
/// km unit converted to miles. The unit is always "miles" once a value
/// is produced.
pub fn parse_mileage(txt: &str) -> (Option<i64>, Option<String>) {
    let s = txt.trim().to_lowercase();
    if s.is_empty() {
        return (None, None);
    }

    let is_km = KM_RE.is_match(&s);
    // Drop unit words so "km" cannot be mistaken for a thousands marker
    let s = MILEAGE_UNIT_RE.replace_all(&s, " ");

    let token = if let Some(caps) = MILEAGE_RANGE_RE.captures(&s) {
        let left = &caps[1];
        let right = &caps[2];
        if right.contains('k') && !left.contains('k') {
            format!("{left}k")
        } else {
            left.to_string()
        }
    } else {
        match MILEAGE_NUM_RE.captures(&s) {
            Some(caps) => {
                let marker = caps.get(2).map_or("", |m| m.as_str());
                format!("{}{}", &caps[1], marker)
            }
            None => return (None, None),
        }
    };

    let has_k = token.contains('k');
    let digits = token.replace([',', 'k'], "");
    let base: f64 = match digits.parse() {
        Ok(v) => v,
        Err(_) => return (None, None),
    };

    let mut value = if has_k { base * 1000.0 } else { base };
    if is_km {
        value *= KM_TO_MILES;
    }

    (Some(value.round() as i64), Some("miles".to_string()))
}

/// Find a plausible year: a 4-digit token in [1900, current_year + 1],
/// else a 2-digit token mapped to 2000s (<= 30) or 1900s (> 30).
pub fn parse_year(txt: &str) -> Option<i32> {
    let max_year = chrono::Utc::now().year() + 1;

    if let Some(caps) = YEAR4_RE.captures(txt) {
        if let Ok(y) = caps[1].parse::<i32>() {
            if (1900..=max_year).contains(&y) {
                return Some(y);
            }
        }
    }

    if let Some(caps) = YEAR2_RE.captures(txt) {
        if let Ok(yy) = caps[1].parse::<i32>() {
            return Some(if yy <= 30 { 2000 + yy } else { 1900 + yy });
        }
    }

    None
}

/// Canonicalize a brand name via the alias table, preserving mixed-case
/// inputs and title-casing plain lowercase ones.
pub fn normalize_brand(txt: &str) -> Option<String> {
    let s = txt.trim();
    if s.is_empty() {
        return None;
    }

    let key: String = s
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if let Some((_, canonical)) = BRAND_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return Some((*canonical).to_string());
    }

    // "SampleBrand" and friends already carry casing worth keeping
    if s.chars().skip(1).any(|c| c.is_uppercase()) {
        return Some(s.to_string());
    }

    Some(title_case(s))
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
