//! Product metadata lookup and the card the presentation layer renders.

pub mod openfoodfacts;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::LookupError;

pub use openfoodfacts::OpenFoodFactsClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub code: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub quantity: Option<String>,
    pub categories: Option<String>,
    pub image_url: Option<String>,
    pub nutrition_grade: Option<String>,
    pub ingredients: Option<String>,
}

impl ProductInfo {
    /// Short label stored on the scan record: `"<brand> <name>"`, or
    /// whichever of the two exists.
    pub fn display_name(&self) -> Option<String> {
        match (self.brand.as_deref(), self.name.as_deref()) {
            (Some(brand), Some(name)) => Some(format!("{brand} {name}")),
            (None, Some(name)) => Some(name.to_string()),
            (Some(brand), None) => Some(brand.to_string()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum ProductCard {
    Pending,
    /// Product search is disabled; the user may still ask for it.
    Skipped,
    Found { product: ProductInfo },
    NotFound {
        code: String,
        search_links: Vec<SearchLink>,
    },
}

impl ProductCard {
    pub fn not_found(code: &str) -> Self {
        ProductCard::NotFound {
            code: code.to_string(),
            search_links: fallback_search_links(code),
        }
    }
}

/// External searches offered when the product database has nothing.
pub fn fallback_search_links(code: &str) -> Vec<SearchLink> {
    let candidates = [
        (
            "Open Food Facts",
            "https://world.openfoodfacts.org/cgi/search.pl",
            vec![("search_terms", code), ("search_simple", "1")],
        ),
        ("Google", "https://www.google.com/search", vec![("q", code)]),
        ("UPCitemdb", "https://www.upcitemdb.com/query", vec![("upc", code)]),
    ];

    candidates
        .into_iter()
        .filter_map(|(label, base, params)| {
            Url::parse_with_params(base, params.iter()).ok().map(|url| SearchLink {
                label: label.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// `Ok(None)` means the database answered and has no such product.
    async fn lookup(&self, code: &str) -> Result<Option<ProductInfo>, LookupError>;
}

/// Answers "not found" for everything without touching the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLookup;

#[async_trait]
impl ProductLookup for OfflineLookup {
    async fn lookup(&self, _code: &str) -> Result<Option<ProductInfo>, LookupError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_links_encode_the_code() {
        let links = fallback_search_links("A&B 12");
        assert_eq!(links.len(), 3);
        assert_eq!(links[1].label, "Google");
        assert_eq!(links[1].url, "https://www.google.com/search?q=A%26B+12");
        assert!(links[0].url.contains("search_terms=A%26B+12"));
    }

    #[test]
    fn display_name_prefers_brand_and_name() {
        let mut info = ProductInfo {
            code: "1".into(),
            name: Some("Spread".into()),
            brand: Some("Acme".into()),
            ..Default::default()
        };
        assert_eq!(info.display_name().as_deref(), Some("Acme Spread"));
        info.brand = None;
        assert_eq!(info.display_name().as_deref(), Some("Spread"));
        info.name = None;
        assert_eq!(info.display_name(), None);
    }

    #[test]
    fn not_found_card_carries_links() {
        match ProductCard::not_found("5901234123457") {
            ProductCard::NotFound { code, search_links } => {
                assert_eq!(code, "5901234123457");
                assert!(!search_links.is_empty());
            }
            other => panic!("unexpected card {other:?}"),
        }
    }
}
