pub mod gallery;
pub mod inline;
pub mod listing;
pub mod pagination;
pub mod site_info;
pub mod structured;
pub mod tabular;
pub mod transport;

use serde_json::{Map, Value};
use url::Url;

use super::record::Category;
use super::signals::Doc;

/// Result of probing one optional capability. `Unsupported` is a value,
/// not an error; the scorer filters it out silently.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability<T> {
    Supported(T),
    Unsupported,
}

impl<T> Capability<T> {
    pub fn supported(self) -> Option<T> {
        match self {
            Capability::Supported(v) => Some(v),
            Capability::Unsupported => None,
        }
    }
}

/// The closed strategy set. Order of declaration is irrelevant; the
/// authoritative order is `REGISTRY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    HybridJsonHtml,
    JsonldVehicle,
    InlineBlocks,
    SpecTable,
    ListingImageGrid,
    ListingCard,
    ListingSection,
    ListingJsonPayload,
    ListingAjaxInfinite,
    PaginationQuery,
    PaginationPath,
    DealerInfo,
}

/// Authoritative registration order: detail first, then listings,
/// pagination, dealer. Ties within a category resolve to the earlier
/// entry, so this order is part of the observable behavior.
pub const REGISTRY: [Strategy; 12] = [
    Strategy::HybridJsonHtml,
    Strategy::JsonldVehicle,
    Strategy::InlineBlocks,
    Strategy::SpecTable,
    Strategy::ListingImageGrid,
    Strategy::ListingCard,
    Strategy::ListingSection,
    Strategy::ListingJsonPayload,
    Strategy::ListingAjaxInfinite,
    Strategy::PaginationQuery,
    Strategy::PaginationPath,
    Strategy::DealerInfo,
];

impl Strategy {
    pub const fn name(self) -> &'static str {
        match self {
            Strategy::HybridJsonHtml => "detail_hybrid_json_html",
            Strategy::JsonldVehicle => "detail_jsonld_vehicle",
            Strategy::InlineBlocks => "detail_inline_html_blocks",
            Strategy::SpecTable => "detail_html_spec_table",
            Strategy::ListingImageGrid => "listing_image_grid",
            Strategy::ListingCard => "listing_card",
            Strategy::ListingSection => "listing_section",
            Strategy::ListingJsonPayload => "listing_json_payload",
            Strategy::ListingAjaxInfinite => "listing_ajax_infinite",
            Strategy::PaginationQuery => "pagination_query",
            Strategy::PaginationPath => "pagination_path",
            Strategy::DealerInfo => "dealer_info_jsonld",
        }
    }

    pub const fn category(self) -> Category {
        match self {
            Strategy::HybridJsonHtml
            | Strategy::JsonldVehicle
            | Strategy::InlineBlocks
            | Strategy::SpecTable => Category::Detail,
            Strategy::ListingImageGrid
            | Strategy::ListingCard
            | Strategy::ListingSection
            | Strategy::ListingJsonPayload
            | Strategy::ListingAjaxInfinite => Category::Listing,
            Strategy::PaginationQuery | Strategy::PaginationPath => Category::Pagination,
            Strategy::DealerInfo => Category::SiteInfo,
        }
    }

    /// Ordered, de-duplicated absolute listing URLs.
    pub fn listing_links(self, doc: &Doc, page_url: &Url) -> Capability<Vec<Url>> {
        match self {
            Strategy::ListingImageGrid => {
                Capability::Supported(listing::image_grid_links(doc, page_url))
            }
            Strategy::ListingCard => Capability::Supported(listing::card_links(doc, page_url)),
            Strategy::ListingSection => {
                Capability::Supported(listing::section_links(doc, page_url))
            }
            Strategy::ListingJsonPayload => {
                Capability::Supported(transport::json_payload_links(doc, page_url))
            }
            Strategy::ListingAjaxInfinite => {
                Capability::Supported(transport::ajax_links(doc, page_url))
            }
            _ => Capability::Unsupported,
        }
    }

    /// Next-page URL, when the strategy knows how to find one.
    pub fn next_page(self, doc: &Doc, page_url: &Url) -> Capability<Option<Url>> {
        match self {
            Strategy::PaginationQuery => {
                Capability::Supported(pagination::next_by_query(doc, page_url))
            }
            Strategy::PaginationPath => {
                Capability::Supported(pagination::next_by_path(doc, page_url))
            }
            Strategy::ListingAjaxInfinite => {
                Capability::Supported(transport::ajax_links(doc, page_url).into_iter().next())
            }
            _ => Capability::Unsupported,
        }
    }

    /// Raw detail output for detail-category strategies only. The raw map
    /// feeds the output assembler; no other category ever emits one.
    pub fn detail(self, doc: &Doc, _page_url: &Url) -> Capability<Option<Map<String, Value>>> {
        match self {
            Strategy::HybridJsonHtml => Capability::Supported(structured::hybrid_detail(doc)),
            Strategy::JsonldVehicle => Capability::Supported(structured::jsonld_detail(doc)),
            Strategy::InlineBlocks => Capability::Supported(inline::detail(doc)),
            Strategy::SpecTable => Capability::Supported(tabular::detail(doc)),
            _ => Capability::Unsupported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_order_is_detail_first() {
        let categories: Vec<Category> = REGISTRY.iter().map(|s| s.category()).collect();
        let first_non_detail = categories
            .iter()
            .position(|c| *c != Category::Detail)
            .unwrap();
        assert!(categories[..first_non_detail]
            .iter()
            .all(|c| *c == Category::Detail));
        assert_eq!(*categories.last().unwrap(), Category::SiteInfo);
    }

    #[test]
    fn non_detail_strategies_never_emit_detail() {
        let doc = Doc::parse("<html><body></body></html>");
        let url = Url::parse("https://example.com/").unwrap();
        for strategy in REGISTRY {
            if strategy.category() != Category::Detail {
                assert_eq!(strategy.detail(&doc, &url), Capability::Unsupported);
            }
        }
    }

    #[test]
    fn unsupported_is_a_value_not_an_error() {
        let doc = Doc::parse("<html><body></body></html>");
        let url = Url::parse("https://example.com/").unwrap();
        assert!(Strategy::JsonldVehicle
            .listing_links(&doc, &url)
            .supported()
            .is_none());
        assert!(Strategy::ListingCard.next_page(&doc, &url).supported().is_none());
    }
}
