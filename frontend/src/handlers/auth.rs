use super::CatalogClient;
use crate::error::CatalogResult;
use crate::models::{Credentials, LoginTokens};

impl CatalogClient {
    pub async fn post_login(&self, credentials: &Credentials) -> CatalogResult<LoginTokens> {
        let url = self.url("auth/login")?;
        tracing::debug!(email = %credentials.email, "logging in");
        self.send_json(self.http.post(url).json(credentials)).await
    }
}
