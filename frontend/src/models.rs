use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed list page size for the whole panel.
pub const PAGE_SIZE: u32 = 10;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CategoryRef {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Product {
    pub id: u64,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    pub category: CategoryRef,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Product {
    pub fn category_id(&self) -> u64 {
        self.category.id
    }
}

pub type Category = CategoryRef;

/// Search predicate for the product list. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Filter {
    pub title: Option<String>,
    pub category_id: Option<u64>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category_id.is_none()
            && self.price_min.is_none()
            && self.price_max.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn for_page(page: u32) -> Self {
        PageRequest {
            offset: page.saturating_sub(1).saturating_mul(PAGE_SIZE),
            limit: PAGE_SIZE,
        }
    }
}

/// One page of products as returned by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub products: Vec<Product>,
    /// Only set when the service reports a count; the public API does not.
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub products: Vec<Product>,
    pub total: Option<u64>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub title: String,
    pub price: f64,
    pub description: String,
    pub category_id: u64,
    pub images: Vec<String>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}
