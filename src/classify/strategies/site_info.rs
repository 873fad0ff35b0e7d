use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use serde_json::Value;

use crate::classify::jsonld;
use crate::classify::record::SiteInfoRecord;
use crate::classify::signals::Doc;

static TEL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href^="tel:"]"#).unwrap());
static MAILTO_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href^="mailto:"]"#).unwrap());
static H1_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
// Dealer-platform inline object literal carrying the site email
static DEALER_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)var\s+d2k\s*=\s*\{[\s\S]*?dealerDetails\s*:\s*\{[\s\S]*?Email\s*:\s*['"]([^'"]+)['"]"#,
    )
    .unwrap()
});

fn field_text(node: Option<&Value>) -> Option<String> {
    match node? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Object(map) => field_text(
            map.get("name")
                .or_else(|| map.get("telephone"))
                .or_else(|| map.get("email")),
        ),
        _ => None,
    }
}

fn compose_address(node: Option<&Value>) -> Option<String> {
    match node? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Object(map) => {
            let parts: Vec<String> = [
                "streetAddress",
                "addressLocality",
                "addressRegion",
                "postalCode",
                "addressCountry",
            ]
            .iter()
            .filter_map(|k| field_text(map.get(*k)))
            .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

/// Site/dealer info: Organization-type structured objects first, then
/// the vendor inline-script email, tel:/mailto: anchors and the first
/// heading as fallbacks.
pub fn extract(doc: &Doc) -> SiteInfoRecord {
    if let Some(org) = doc.jsonld.iter().find(|o| jsonld::is_organization(o)) {
        return SiteInfoRecord {
            name: field_text(org.get("name")),
            telephone: field_text(org.get("telephone").or_else(|| org.get("phone"))),
            email: field_text(org.get("email")),
            address: compose_address(org.get("address")),
            raw: Some(org.clone()),
        };
    }

    let email = DEALER_OBJECT_RE
        .captures(&doc.raw)
        .map(|c| c[1].trim().to_string())
        .or_else(|| {
            doc.html
                .select(&MAILTO_SEL)
                .next()
                .map(|a| a.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty())
        });
    let telephone = doc
        .html
        .select(&TEL_SEL)
        .next()
        .map(|a| a.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty());
    let name = doc
        .html
        .select(&H1_SEL)
        .next()
        .map(|h| h.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty());

    SiteInfoRecord {
        name,
        telephone,
        email,
        address: None,
        raw: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_jsonld() {
        let doc = Doc::parse(
            r#"<script type="application/ld+json">
            {
              "@type": "AutomotiveBusiness",
              "name": "Sample Motors",
              "telephone": "01234 567890",
              "email": "sales@samplemotors.example",
              "address": {
                "streetAddress": "1 High St",
                "addressLocality": "Sampletown",
                "postalCode": "SA1 1AA"
              }
            }
            </script>"#,
        );
        let info = extract(&doc);
        assert_eq!(info.name.as_deref(), Some("Sample Motors"));
        assert_eq!(info.telephone.as_deref(), Some("01234 567890"));
        assert_eq!(
            info.address.as_deref(),
            Some("1 High St, Sampletown, SA1 1AA")
        );
        assert!(info.raw.is_some());
    }

    #[test]
    fn vendor_inline_script_email() {
        let doc = Doc::parse(
            r#"<script>var d2k = { dealerDetails: { Name: "X", Email: "info@dealer.example" } };</script>
               <h1>Dealer Name</h1>"#,
        );
        let info = extract(&doc);
        assert_eq!(info.email.as_deref(), Some("info@dealer.example"));
        assert_eq!(info.name.as_deref(), Some("Dealer Name"));
    }

    #[test]
    fn anchor_fallbacks() {
        let doc = Doc::parse(
            r#"<h1>Fallback Motors</h1>
               <a href="tel:+441234567890">01234 567890</a>
               <a href="mailto:hi@fallback.example">hi@fallback.example</a>"#,
        );
        let info = extract(&doc);
        assert_eq!(info.name.as_deref(), Some("Fallback Motors"));
        assert_eq!(info.telephone.as_deref(), Some("01234 567890"));
        assert_eq!(info.email.as_deref(), Some("hi@fallback.example"));
        assert!(info.raw.is_none());
    }

    #[test]
    fn subtype_organizations_match() {
        let doc = Doc::parse(
            r#"<script type="application/ld+json">
            {"@type": "SportsOrganization", "name": "Weird but accepted"}
            </script>"#,
        );
        assert_eq!(extract(&doc).name.as_deref(), Some("Weird but accepted"));
    }
}
