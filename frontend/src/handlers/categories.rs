use super::CatalogClient;
use crate::error::CatalogResult;
use crate::models::Category;

impl CatalogClient {
    /// The catalog returns every category in one response.
    pub async fn fetch_categories(&self) -> CatalogResult<Vec<Category>> {
        let url = self.url("categories")?;
        tracing::debug!("fetching categories");
        self.send_json(self.http.get(url)).await
    }
}
