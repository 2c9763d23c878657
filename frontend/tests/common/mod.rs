//! In-memory catalog used by the panel and server tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use catalog_admin::error::{CatalogError, CatalogResult};
use catalog_admin::handlers::CatalogApi;
use catalog_admin::models::{
    Category, CategoryRef, Credentials, Filter, ListPage, LoginTokens, NewProduct, PageRequest,
    Product, ProductPatch,
};

#[derive(Default)]
struct FakeState {
    products: Vec<Product>,
    list_calls: Vec<(Filter, PageRequest)>,
    mutation_calls: usize,
    fail_mutations: Option<CatalogError>,
    fail_categories: bool,
    failing_lists: usize,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<FakeState>,
}

pub fn category(id: u64) -> CategoryRef {
    CategoryRef {
        id,
        name: format!("Category {id}"),
        image: None,
    }
}

pub fn product(id: u64, category_id: u64) -> Product {
    Product {
        id,
        title: format!("Product {id}"),
        price: 10.0 * id as f64,
        description: "A product".into(),
        category: category(category_id),
        images: vec![format!("https://i.imgur.com/{id}.jpeg")],
    }
}

impl FakeCatalog {
    pub fn with_products(count: u64) -> Self {
        let fake = FakeCatalog::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.products = (1..=count).map(|id| product(id, 1 + id % 3)).collect();
            state.next_id = count + 1;
        }
        fake
    }

    pub fn list_calls(&self) -> Vec<(Filter, PageRequest)> {
        self.state.lock().unwrap().list_calls.clone()
    }

    pub fn mutation_calls(&self) -> usize {
        self.state.lock().unwrap().mutation_calls
    }

    pub fn fail_mutations_with(&self, err: CatalogError) {
        self.state.lock().unwrap().fail_mutations = Some(err);
    }

    pub fn fail_categories(&self) {
        self.state.lock().unwrap().fail_categories = true;
    }

    /// The next `count` list calls fail with a network error.
    pub fn fail_next_lists(&self, count: usize) {
        self.state.lock().unwrap().failing_lists = count;
    }

    pub fn product_count(&self) -> usize {
        self.state.lock().unwrap().products.len()
    }

    pub fn find(&self, id: u64) -> Option<Product> {
        self.state
            .lock()
            .unwrap()
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    fn begin_mutation(&self) -> CatalogResult<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        state.mutation_calls += 1;
        match state.fail_mutations.clone() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn list_products(&self, filter: &Filter, page: PageRequest) -> CatalogResult<ListPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls.push((filter.clone(), page));
        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            return Err(CatalogError::Network("connection reset".into()));
        }
        let products = state
            .products
            .iter()
            .filter(|p| {
                filter
                    .title
                    .as_ref()
                    .is_none_or(|t| p.title.to_lowercase().contains(&t.to_lowercase()))
                    && filter.category_id.is_none_or(|c| p.category.id == c)
                    && filter.price_min.is_none_or(|min| p.price >= min)
                    && filter.price_max.is_none_or(|max| p.price <= max)
            })
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok(ListPage {
            products,
            total: None,
        })
    }

    async fn list_categories(&self) -> CatalogResult<Vec<Category>> {
        if self.state.lock().unwrap().fail_categories {
            return Err(CatalogError::Remote {
                status: 500,
                message: "Internal server error".into(),
            });
        }
        Ok((1..=3).map(category).collect())
    }

    async fn create_product(&self, new: &NewProduct) -> CatalogResult<Product> {
        let mut state = self.begin_mutation()?;
        let id = state.next_id;
        state.next_id += 1;
        let created = Product {
            id,
            title: new.title.clone(),
            price: new.price,
            description: new.description.clone(),
            category: category(new.category_id),
            images: new.images.clone(),
        };
        state.products.push(created.clone());
        Ok(created)
    }

    async fn update_product(&self, id: u64, patch: &ProductPatch) -> CatalogResult<Product> {
        let mut state = self.begin_mutation()?;
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(CatalogError::Remote {
                status: 400,
                message: "Could not find any entity".into(),
            })?;
        if let Some(title) = &patch.title {
            product.title = title.clone();
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(description) = &patch.description {
            product.description = description.clone();
        }
        if let Some(category_id) = patch.category_id {
            product.category = category(category_id);
        }
        if let Some(images) = &patch.images {
            product.images = images.clone();
        }
        Ok(product.clone())
    }

    async fn delete_product(&self, id: u64) -> CatalogResult<()> {
        let mut state = self.begin_mutation()?;
        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        if state.products.len() == before {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> CatalogResult<LoginTokens> {
        if credentials.password == "changeme" {
            Ok(LoginTokens {
                access_token: format!("token-for-{}", credentials.email),
                refresh_token: None,
            })
        } else {
            Err(CatalogError::Remote {
                status: 401,
                message: "Unauthorized".into(),
            })
        }
    }
}
