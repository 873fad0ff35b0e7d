pub mod jsonld;
pub mod normalize;
pub mod record;
pub mod scorer;
pub mod signals;
pub mod strategies;

use serde_json::json;
use tracing::debug;
use url::Url;

use self::record::{assemble_detail, Category, PageOutcome};
use self::signals::{Doc, SignalSet};
use self::strategies::{gallery, site_info};

/// Classify one fetched page and extract whatever its winning strategy
/// supports. Pure function of the inputs: same HTML and URL always
/// produce the same outcome.
pub fn classify_page(sample_id: &str, html: &str, page_url: &Url) -> PageOutcome {
    let doc = Doc::parse(html);
    let mut signals = SignalSet::compute(&doc);
    let verdict = scorer::score(&doc, page_url, &mut signals);

    let mut diag = json!({
        "signals": signals,
        "candidates": verdict.candidates,
    });

    let mut outcome = PageOutcome {
        sample_id: sample_id.to_string(),
        strategy_name: None,
        category: Category::None,
        detail_record: None,
        site_info_record: None,
        listing_links: None,
        diagnostics: None,
    };

    if let Some(winner) = verdict.winner {
        debug!(sample_id, strategy = winner.name(), "classified");
        outcome.strategy_name = Some(winner.name());
        outcome.category = winner.category();

        match winner.category() {
            Category::Detail => {
                if let Some(Some(rawmap)) = winner.detail(&doc, page_url).supported() {
                    outcome.detail_record = Some(assemble_detail(winner.name(), rawmap));
                }
                let media = gallery::collect(&doc, page_url);
                if !media.is_empty() {
                    diag["media"] = json!(media);
                }
            }
            Category::Listing => {
                let links = winner
                    .listing_links(&doc, page_url)
                    .supported()
                    .unwrap_or_default();
                outcome.listing_links =
                    Some(links.into_iter().map(|u| u.to_string()).collect());
            }
            Category::Pagination => {
                let next = winner.next_page(&doc, page_url).supported().flatten();
                diag["next_page"] = match next {
                    Some(u) => json!(u.to_string()),
                    None => json!(null),
                };
            }
            Category::SiteInfo => {
                outcome.site_info_record = Some(site_info::extract(&doc));
            }
            Category::None => {}
        }
    } else {
        debug!(sample_id, "no strategy matched");
    }

    outcome.diagnostics = Some(diag);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
        <html><head>
          <title>2018 SampleBrand S-Model | Sample Motors</title>
          <script type="application/ld+json">
          {
            "@type": "Vehicle",
            "name": "2018 SampleBrand S-Model",
            "brand": {"name": "SampleBrand"},
            "model": "S-Model",
            "offers": {"price": "12995", "priceCurrency": "GBP"}
          }
          </script>
        </head><body>
          <table>
            <tr><th>Mileage</th><td>30,000 miles</td></tr>
            <tr><th>Fuel</th><td>Petrol</td></tr>
            <tr><th>Transmission</th><td>Manual</td></tr>
          </table>
          <div class="gallery"><img src="/img/1-large.jpg"></div>
        </body></html>"#;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn detail_page_end_to_end() {
        let outcome = classify_page(
            "sample-1",
            DETAIL_PAGE,
            &url("https://dealer.example.com/car/s-model-1"),
        );
        assert_eq!(outcome.category, Category::Detail);
        assert_eq!(outcome.strategy_name, Some("detail_hybrid_json_html"));

        let record = outcome.detail_record.as_ref().unwrap();
        assert_eq!(record.brand.as_deref(), Some("SampleBrand"));
        assert_eq!(record.model.as_deref(), Some("S-Model"));
        assert_eq!(record.year, Some(2018));
        assert_eq!(record.price_value, Some(12995.0));
        assert_eq!(record.currency.as_deref(), Some("GBP"));
        assert_eq!(record.mileage_value, Some(30000));
        assert_eq!(record.mileage_unit.as_deref(), Some("miles"));
        assert_eq!(record.fuel.as_deref(), Some("Petrol"));
        assert_eq!(record.confidence, 1.0);

        // gallery enrichment rides in the diagnostics
        let diag = outcome.diagnostics.as_ref().unwrap();
        assert!(diag["media"]["images"]
            .as_array()
            .is_some_and(|imgs| !imgs.is_empty()));
    }

    #[test]
    fn classification_is_deterministic() {
        let page_url = url("https://dealer.example.com/car/s-model-1");
        let a = serde_json::to_string(&classify_page("s", DETAIL_PAGE, &page_url)).unwrap();
        let b = serde_json::to_string(&classify_page("s", DETAIL_PAGE, &page_url)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn listing_page_never_leaks_detail_fields() {
        let html = r#"
            <div class="vehicle-card"><a href="/car/1">one</a></div>
            <div class="vehicle-card"><a href="/car/2">two</a></div>
            <div class="vehicle-card"><a href="/car/3">three</a></div>"#;
        let outcome = classify_page("s", html, &url("https://dealer.example.com/used-cars"));
        assert_eq!(outcome.category, Category::Listing);
        assert!(outcome.detail_record.is_none());
        assert!(outcome.site_info_record.is_none());
        assert_eq!(outcome.listing_links.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn pagination_page_reports_next_url() {
        let html = r#"<a rel="next" href="/used-cars?page=3">Next</a>"#;
        let outcome = classify_page("s", html, &url("https://dealer.example.com/used-cars?page=2"));
        assert_eq!(outcome.category, Category::Pagination);
        let diag = outcome.diagnostics.as_ref().unwrap();
        assert_eq!(
            diag["next_page"].as_str(),
            Some("https://dealer.example.com/used-cars?page=3")
        );
    }

    #[test]
    fn unrecognizable_page_is_none() {
        let outcome = classify_page(
            "s",
            "<html><body><p>nothing to see</p></body></html>",
            &url("https://dealer.example.com/blog"),
        );
        assert_eq!(outcome.category, Category::None);
        assert!(outcome.strategy_name.is_none());
        assert!(outcome.detail_record.is_none());
        assert!(outcome.site_info_record.is_none());
        assert!(outcome.listing_links.is_none());
    }

    #[test]
    fn detail_record_serializes_canonical_shape() {
        let outcome = classify_page(
            "s",
            DETAIL_PAGE,
            &url("https://dealer.example.com/car/s-model-1"),
        );
        let value = serde_json::to_value(&outcome).unwrap();
        let record = value["detailRecord"].as_object().unwrap();
        for key in record::CANONICAL_KEYS {
            assert!(record.contains_key(*key), "missing canonical key {key}");
        }
        assert_eq!(record["_source"], "hybrid");
    }
}
