//! Create/update/delete against the catalog.
//!
//! A successful write never patches cached rows; it drops every cached list
//! so the next read goes back to the server.

use std::sync::Arc;

use crate::error::{CatalogError, CatalogResult};
use crate::form::FormSession;
use crate::handlers::CatalogApi;
use crate::models::{NewProduct, Product, ProductPatch};
use crate::notify::{Notification, Notifier};
use crate::query::{ListQueryCoordinator, PRODUCTS_PREFIX};

#[derive(Clone)]
pub struct MutationCoordinator {
    api: Arc<dyn CatalogApi>,
    notifier: Arc<dyn Notifier>,
}

impl MutationCoordinator {
    pub fn new(api: Arc<dyn CatalogApi>, notifier: Arc<dyn Notifier>) -> Self {
        MutationCoordinator { api, notifier }
    }

    pub async fn create(
        &self,
        product: NewProduct,
        cache: &mut ListQueryCoordinator,
        form: &mut Option<FormSession>,
    ) -> CatalogResult<Product> {
        let outcome = self.api.create_product(&product).await;
        self.settle(outcome, "Product added successfully", "Failed to add product", cache, Some(form))
    }

    pub async fn update(
        &self,
        id: u64,
        patch: ProductPatch,
        cache: &mut ListQueryCoordinator,
        form: &mut Option<FormSession>,
    ) -> CatalogResult<Product> {
        let outcome = self.api.update_product(id, &patch).await;
        self.settle(
            outcome,
            "Product updated successfully",
            "Failed to update product",
            cache,
            Some(form),
        )
    }

    pub async fn delete(&self, id: u64, cache: &mut ListQueryCoordinator) -> CatalogResult<()> {
        let outcome = self.api.delete_product(id).await;
        self.settle(
            outcome,
            "Product deleted successfully",
            "Failed to delete product",
            cache,
            None,
        )
    }

    fn settle<T>(
        &self,
        outcome: Result<T, CatalogError>,
        success: &str,
        failure: &str,
        cache: &mut ListQueryCoordinator,
        form: Option<&mut Option<FormSession>>,
    ) -> CatalogResult<T> {
        match outcome {
            Ok(value) => {
                cache.invalidate(PRODUCTS_PREFIX);
                if let Some(form) = form {
                    *form = None;
                }
                self.notifier.notify(Notification::success(success));
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(error = %err, "{failure}");
                self.notifier
                    .notify(Notification::error(failure, err.user_message()));
                Err(err)
            }
        }
    }
}
