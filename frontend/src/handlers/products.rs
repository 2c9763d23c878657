use reqwest::StatusCode;

use super::CatalogClient;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{Filter, ListPage, NewProduct, PageRequest, Product, ProductPatch};

const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Query parameters for a list request. Absent filter fields are not sent at all.
pub fn list_params(filter: &Filter, page: PageRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("offset", page.offset.to_string()),
        ("limit", page.limit.to_string()),
    ];

    if let Some(title) = &filter.title {
        params.push(("title", title.clone()));
    }
    if let Some(category_id) = filter.category_id {
        params.push(("categoryId", category_id.to_string()));
    }
    if let Some(price_min) = filter.price_min {
        params.push(("price_min", price_min.to_string()));
    }
    if let Some(price_max) = filter.price_max {
        params.push(("price_max", price_max.to_string()));
    }

    params
}

impl CatalogClient {
    pub async fn fetch_products(&self, filter: &Filter, page: PageRequest) -> CatalogResult<ListPage> {
        let url = self.url("products")?;
        let params = list_params(filter, page);
        tracing::debug!(?params, "fetching products");

        let response = self.send(self.http.get(url).query(&params)).await?;
        let total = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await?;
        let products: Vec<Product> = serde_json::from_str(&body)?;

        Ok(ListPage { products, total })
    }

    pub async fn post_product(&self, product: &NewProduct) -> CatalogResult<Product> {
        let url = self.url("products")?;
        tracing::debug!(title = %product.title, "creating product");
        self.send_json(self.http.post(url).json(product)).await
    }

    pub async fn put_product(&self, id: u64, patch: &ProductPatch) -> CatalogResult<Product> {
        let url = self.url(&format!("products/{id}"))?;
        tracing::debug!(id, "updating product");
        self.send_json(self.http.put(url).json(patch)).await
    }

    pub async fn remove_product(&self, id: u64) -> CatalogResult<()> {
        let url = self.url(&format!("products/{id}"))?;
        tracing::debug!(id, "deleting product");
        match self.send(self.http.delete(url)).await {
            Ok(_) => Ok(()),
            Err(CatalogError::Remote { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(CatalogError::NotFound(id))
            }
            Err(e) => Err(e),
        }
    }
}
