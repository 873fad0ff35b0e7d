use serde::Serialize;
use url::Url;

use super::record::Category;
use super::signals::{Doc, SignalSet};
use super::strategies::{Strategy, REGISTRY};

/// Additive evidence weights for one detail strategy. Each field names
/// the signal it rewards; a zero weight means the strategy ignores that
/// signal entirely.
#[derive(Debug, Clone, Copy)]
pub struct DetailWeights {
    /// A structured vehicle object (JSON-LD) is present.
    pub structured_vehicle: f64,
    /// Bonus when the structured object is corroborated by spec markup
    /// (label/value pairs or a table) on the same page.
    pub structured_with_specs: f64,
    /// A machine-readable price meta tag.
    pub price_meta: f64,
    /// A plausible model year in the page title.
    pub title_year: f64,
    /// A vehicle-typed microdata scope.
    pub microdata: f64,
    /// Label/value spec pairs in the markup.
    pub label_value_pairs: f64,
    /// At least one table element.
    pub table: f64,
}

impl DetailWeights {
    const fn for_strategy(strategy: Strategy) -> Option<DetailWeights> {
        match strategy {
            Strategy::HybridJsonHtml => Some(DetailWeights {
                structured_vehicle: 2.0,
                structured_with_specs: 4.0,
                price_meta: 1.0,
                title_year: 1.0,
                microdata: 0.0,
                label_value_pairs: 1.0,
                table: 2.0,
            }),
            Strategy::JsonldVehicle => Some(DetailWeights {
                structured_vehicle: 5.0,
                structured_with_specs: 0.0,
                price_meta: 2.0,
                title_year: 1.0,
                microdata: 0.0,
                label_value_pairs: 0.0,
                table: 0.0,
            }),
            Strategy::InlineBlocks => Some(DetailWeights {
                structured_vehicle: 0.0,
                structured_with_specs: 0.0,
                price_meta: 1.0,
                title_year: 1.0,
                microdata: 2.0,
                label_value_pairs: 4.0,
                table: 0.0,
            }),
            Strategy::SpecTable => Some(DetailWeights {
                structured_vehicle: 0.0,
                structured_with_specs: 0.0,
                price_meta: 1.0,
                title_year: 1.0,
                microdata: 0.0,
                label_value_pairs: 1.0,
                table: 4.0,
            }),
            _ => None,
        }
    }

    fn raw_score(&self, signals: &SignalSet) -> f64 {
        let mut raw = 0.0;
        if signals.has_structured_vehicle_object {
            raw += self.structured_vehicle;
            if signals.has_label_value_pairs || signals.has_table {
                raw += self.structured_with_specs;
            }
        }
        if signals.has_price_meta {
            raw += self.price_meta;
        }
        if signals.has_title_year {
            raw += self.title_year;
        }
        if signals.has_microdata {
            raw += self.microdata;
        }
        if signals.has_label_value_pairs {
            raw += self.label_value_pairs;
        }
        if signals.has_table {
            raw += self.table;
        }
        raw
    }
}

/// Raw detail evidence saturates here; anything at or above maps to 10.
const MAX_DETAIL_RAW: f64 = 8.0;
/// Listing link counts saturate here; 20 or more links maps to 10.
const MAX_LISTING_LINKS: usize = 20;
/// Flat score for a page with a discoverable next-page link.
const PAGINATION_SCORE: f64 = 6.0;
/// Flat score for a page carrying an organization-type structured object.
const SITE_INFO_SCORE: f64 = 4.0;

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn scale(raw: f64, max: f64) -> f64 {
    round2(raw.min(max) / max * 10.0)
}

/// One scored candidate, kept for the diagnostics payload.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub strategy: &'static str,
    pub category: &'static str,
    pub score: f64,
}

/// Scoring outcome: every strategy that produced evidence, plus the
/// winner after tie-breaking. No candidates means the page is "none".
#[derive(Debug)]
pub struct Verdict {
    pub winner: Option<Strategy>,
    pub candidates: Vec<CandidateScore>,
}

/// Score every registered strategy against the page and pick a winner.
///
/// Ties break by score first, then category priority (detail > listing >
/// pagination > site info), then registration order. Strategies with no
/// evidence never become candidates, so an empty page yields no winner.
pub fn score(doc: &Doc, page_url: &Url, signals: &mut SignalSet) -> Verdict {
    let mut candidates = Vec::new();
    let mut winner: Option<(Strategy, f64)> = None;
    let mut max_links = 0usize;

    for strategy in REGISTRY {
        let score = match strategy.category() {
            Category::Detail => {
                let Some(weights) = DetailWeights::for_strategy(strategy) else {
                    continue;
                };
                let raw = weights.raw_score(signals);
                if raw <= 0.0 {
                    continue;
                }
                scale(raw, MAX_DETAIL_RAW)
            }
            Category::Listing => {
                let Some(links) = strategy.listing_links(doc, page_url).supported() else {
                    continue;
                };
                if links.is_empty() {
                    continue;
                }
                max_links = max_links.max(links.len());
                scale(links.len().min(MAX_LISTING_LINKS) as f64, MAX_LISTING_LINKS as f64)
            }
            Category::Pagination => {
                match strategy.next_page(doc, page_url).supported() {
                    Some(Some(_)) => PAGINATION_SCORE,
                    _ => continue,
                }
            }
            Category::SiteInfo => {
                if !signals.has_org_object {
                    continue;
                }
                SITE_INFO_SCORE
            }
            Category::None => continue,
        };

        candidates.push(CandidateScore {
            strategy: strategy.name(),
            category: strategy.category().as_str(),
            score,
        });

        let replaces = match winner {
            None => true,
            Some((best, best_score)) => {
                score > best_score
                    || (score == best_score
                        && strategy.category().priority() > best.category().priority())
            }
        };
        if replaces {
            winner = Some((strategy, score));
        }
    }

    signals.discovered_listing_link_count = max_links;

    Verdict {
        winner: winner.map(|(s, _)| s),
        candidates,
    }
}
