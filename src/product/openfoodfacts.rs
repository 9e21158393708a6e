use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use super::{ProductInfo, ProductLookup};
use crate::error::LookupError;

pub const DEFAULT_BASE_URL: &str = "https://world.openfoodfacts.org";

/// Single best-effort request against the Open Food Facts product API.
#[derive(Clone)]
pub struct OpenFoodFactsClient {
    client: Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("codescan/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn product_url(&self, code: &str) -> String {
        format!("{}/api/v0/product/{}.json", self.base_url, code)
    }
}

#[async_trait]
impl ProductLookup for OpenFoodFactsClient {
    async fn lookup(&self, code: &str) -> Result<Option<ProductInfo>, LookupError> {
        let url = self.product_url(code);
        debug!("Looking up product {code} at {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_product_response(code, &body)
    }
}

#[derive(Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: i64,
    product: Option<RawProduct>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawProduct {
    product_name: Option<String>,
    generic_name: Option<String>,
    brands: Option<String>,
    quantity: Option<String>,
    categories: Option<String>,
    image_front_url: Option<String>,
    image_url: Option<String>,
    nutriscore_grade: Option<String>,
    nutrition_grades: Option<String>,
    ingredients_text: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn parse_product_response(
    code: &str,
    body: &str,
) -> Result<Option<ProductInfo>, LookupError> {
    let parsed: ProductResponse =
        serde_json::from_str(body).map_err(|err| LookupError::Parse(err.to_string()))?;

    let raw = match (parsed.status, parsed.product) {
        (1, Some(raw)) => raw,
        _ => return Ok(None),
    };

    let info = ProductInfo {
        code: code.to_string(),
        name: non_empty(raw.product_name).or_else(|| non_empty(raw.generic_name)),
        // Brands arrive comma-separated; the first is the one printed on the pack.
        brand: non_empty(raw.brands)
            .and_then(|brands| brands.split(',').next().map(|b| b.trim().to_string())),
        quantity: non_empty(raw.quantity),
        categories: non_empty(raw.categories),
        image_url: non_empty(raw.image_front_url).or_else(|| non_empty(raw.image_url)),
        nutrition_grade: non_empty(raw.nutriscore_grade)
            .or_else(|| non_empty(raw.nutrition_grades))
            .map(|grade| grade.to_uppercase()),
        ingredients: non_empty(raw.ingredients_text),
    };

    if info.name.is_none() && info.brand.is_none() {
        return Ok(None);
    }
    Ok(Some(info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_found_product() {
        let body = r#"{
            "status": 1,
            "status_verbose": "product found",
            "product": {
                "product_name": "Hazelnut spread",
                "brands": "Acme, Acme Foods",
                "quantity": "400 g",
                "image_front_url": "https://images.example/front.jpg",
                "nutriscore_grade": "e"
            }
        }"#;
        let info = parse_product_response("3017620422003", body).unwrap().unwrap();
        assert_eq!(info.code, "3017620422003");
        assert_eq!(info.name.as_deref(), Some("Hazelnut spread"));
        assert_eq!(info.brand.as_deref(), Some("Acme"));
        assert_eq!(info.nutrition_grade.as_deref(), Some("E"));
        assert_eq!(info.image_url.as_deref(), Some("https://images.example/front.jpg"));
        assert_eq!(info.display_name().as_deref(), Some("Acme Hazelnut spread"));
    }

    #[test]
    fn status_zero_is_not_found() {
        let body = r#"{"code":"5901234123457","status":0,"status_verbose":"product not found"}"#;
        assert_eq!(parse_product_response("5901234123457", body).unwrap(), None);
    }

    #[test]
    fn nameless_product_is_not_found() {
        let body = r#"{"status":1,"product":{"product_name":"  ","quantity":"1 l"}}"#;
        assert_eq!(parse_product_response("1", body).unwrap(), None);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_product_response("1", "<html>"),
            Err(LookupError::Parse(_))
        ));
    }

    #[test]
    fn builds_product_url_without_double_slash() {
        let client =
            OpenFoodFactsClient::new("http://localhost:9/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.product_url("123"),
            "http://localhost:9/api/v0/product/123.json"
        );
    }
}
