//! Client for the remote product catalog.
//!
//! Every call is a single attempt; retries are left to the caller.

pub mod auth;
pub mod categories;
pub mod products;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    Category, Credentials, Filter, ListPage, LoginTokens, NewProduct, PageRequest, Product,
    ProductPatch,
};

pub const DEFAULT_API_URL: &str = "https://api.escuelajs.co/api/v1";

/// Operations the panel needs from the catalog service.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list_products(&self, filter: &Filter, page: PageRequest) -> CatalogResult<ListPage>;
    async fn list_categories(&self) -> CatalogResult<Vec<Category>>;
    async fn create_product(&self, product: &NewProduct) -> CatalogResult<Product>;
    async fn update_product(&self, id: u64, patch: &ProductPatch) -> CatalogResult<Product>;
    async fn delete_product(&self, id: u64) -> CatalogResult<()>;
    async fn login(&self, credentials: &Credentials) -> CatalogResult<LoginTokens>;
}

#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> CatalogResult<Self> {
        // A trailing slash keeps `join` from dropping the last path segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| CatalogError::Network(format!("invalid catalog URL {base_url}: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    fn url(&self, path: &str) -> CatalogResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| CatalogError::Network(format!("failed to build catalog URL: {e}")))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> CatalogResult<Response> {
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "catalog request failed");
        Err(CatalogError::Remote {
            status: status.as_u16(),
            message: service_message(&body),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> CatalogResult<T> {
        let response = self.send(req).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pulls the human-readable message out of an error body.
///
/// The catalog answers with `{"message": "..."}` or `{"message": ["...", "..."]}`;
/// anything else is passed through as raw text.
pub fn service_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    match parsed.as_ref().and_then(|v| v.get("message")) {
        Some(serde_json::Value::String(msg)) => msg.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.trim().to_string(),
    }
}

/// Rejected payloads on create/update become validation errors with the service text.
fn rejected_payload(err: CatalogError) -> CatalogError {
    match err {
        CatalogError::Remote { status, message }
            if status == StatusCode::BAD_REQUEST.as_u16()
                || status == StatusCode::UNPROCESSABLE_ENTITY.as_u16() =>
        {
            CatalogError::Validation(message)
        }
        other => other,
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn list_products(&self, filter: &Filter, page: PageRequest) -> CatalogResult<ListPage> {
        self.fetch_products(filter, page).await
    }

    async fn list_categories(&self) -> CatalogResult<Vec<Category>> {
        self.fetch_categories().await
    }

    async fn create_product(&self, product: &NewProduct) -> CatalogResult<Product> {
        self.post_product(product).await.map_err(rejected_payload)
    }

    async fn update_product(&self, id: u64, patch: &ProductPatch) -> CatalogResult<Product> {
        self.put_product(id, patch).await.map_err(rejected_payload)
    }

    async fn delete_product(&self, id: u64) -> CatalogResult<()> {
        self.remove_product(id).await
    }

    async fn login(&self, credentials: &Credentials) -> CatalogResult<LoginTokens> {
        self.post_login(credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_message_shapes() {
        assert_eq!(service_message(r#"{"message":"Unauthorized"}"#), "Unauthorized");
        assert_eq!(
            service_message(r#"{"message":["price must be a positive number","images must contain at least 1 elements"]}"#),
            "price must be a positive number; images must contain at least 1 elements"
        );
        assert_eq!(service_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn rejected_payload_maps_client_errors_only() {
        let err = rejected_payload(CatalogError::Remote {
            status: 400,
            message: "title should not be empty".into(),
        });
        assert_eq!(err, CatalogError::Validation("title should not be empty".into()));

        let err = rejected_payload(CatalogError::Remote {
            status: 503,
            message: "down".into(),
        });
        assert!(matches!(err, CatalogError::Remote { status: 503, .. }));
    }

    #[test]
    fn url_keeps_api_prefix() {
        let client = CatalogClient::new("https://api.escuelajs.co/api/v1").unwrap();
        assert_eq!(
            client.url("/products/4").unwrap().as_str(),
            "https://api.escuelajs.co/api/v1/products/4"
        );
    }
}
