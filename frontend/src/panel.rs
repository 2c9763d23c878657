//! One signed-in user's product screen: filter bar, paged list, edit form.

use std::sync::Arc;

use chrono::TimeDelta;

use crate::error::CatalogError;
use crate::form::{EditPolicy, FormDraft, FormErrors, FormSession, Submission, has_malformed_images};
use crate::handlers::CatalogApi;
use crate::models::{Category, PAGE_SIZE, Product};
use crate::mutation::MutationCoordinator;
use crate::notify::{Notification, NotificationQueue, Notifier};
use crate::query::{FetchTicket, ListQueryCoordinator, QueryKey, QueryState, Resolution};
use crate::state::{FilterPatch, FilterState, Pagination};

#[derive(Debug, Clone, Copy, Default)]
pub struct PanelOptions {
    pub edit_policy: EditPolicy,
    pub stale_after: Option<TimeDelta>,
}

/// Outcome of submitting the open form.
#[derive(Debug)]
pub enum SubmitOutcome {
    Saved(Product),
    Invalid(FormErrors),
    Rejected(CatalogError),
    NoForm,
}

pub struct ProductsPanel {
    api: Arc<dyn CatalogApi>,
    notifications: Arc<NotificationQueue>,
    mutations: MutationCoordinator,
    filter: FilterState,
    pagination: Pagination,
    query: ListQueryCoordinator,
    form: Option<FormSession>,
    form_errors: Option<FormErrors>,
    categories: Option<Vec<Category>>,
    edit_policy: EditPolicy,
}

impl ProductsPanel {
    pub fn new(api: Arc<dyn CatalogApi>, options: PanelOptions) -> Self {
        let notifications = Arc::new(NotificationQueue::new());
        let notifier: Arc<dyn Notifier> = notifications.clone();
        ProductsPanel {
            mutations: MutationCoordinator::new(api.clone(), notifier),
            api,
            notifications,
            filter: FilterState::default(),
            pagination: Pagination::default(),
            query: ListQueryCoordinator::with_stale_after(options.stale_after),
            form: None,
            form_errors: None,
            categories: None,
            edit_policy: options.edit_policy,
        }
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn edit_policy(&self) -> EditPolicy {
        self.edit_policy
    }

    pub fn apply_filter(&mut self, patch: FilterPatch) {
        self.filter.apply_partial_filter(patch, &mut self.pagination);
    }

    pub fn set_page(&mut self, page: u32) {
        self.pagination.set_page(page);
    }

    pub fn query_key(&self) -> QueryKey {
        QueryKey::new(self.filter.current().clone(), self.pagination.page())
    }

    /// Brings the list for the current (filter, page) up to date and returns it.
    pub async fn load(&mut self) -> &QueryState {
        let key = self.query_key();
        if let Some(ticket) = self.query.observe(key) {
            self.fetch(ticket).await;
        }
        self.query.current()
    }

    /// Fetches the current list again after a failed load.
    pub async fn retry(&mut self) -> &QueryState {
        let key = self.query_key();
        let ticket = match self.query.observe(key) {
            Some(ticket) => Some(ticket),
            None => self.query.retry(),
        };
        if let Some(ticket) = ticket {
            self.fetch(ticket).await;
        }
        self.query.current()
    }

    async fn fetch(&mut self, ticket: FetchTicket) {
        let query = ticket.query().clone();
        let outcome = self
            .api
            .list_products(&query.filter, query.page_request())
            .await;
        let failure = outcome.as_ref().err().cloned();
        match self.query.resolve(ticket, outcome) {
            Resolution::Discarded => {
                tracing::debug!(key = %query.cache_key(), "list response superseded");
            }
            _ => {
                if let Some(err) = failure {
                    self.notifications.notify(Notification::error(
                        "Failed to load products",
                        err.user_message(),
                    ));
                }
            }
        }
    }

    pub fn list_state(&self) -> &QueryState {
        self.query.current()
    }

    /// Whether a page after the current one can exist. A reported total is
    /// trusted; without one, only a full page suggests more rows.
    pub fn has_next_page(&self) -> bool {
        let Some(entry) = self.query.current().entry() else {
            return false;
        };
        let shown = u64::from(self.pagination.page_request().offset) + entry.products.len() as u64;
        match entry.total {
            Some(total) => shown < total,
            None => entry.products.len() as u32 >= PAGE_SIZE,
        }
    }

    /// Category list, fetched once per panel. A failure leaves it empty.
    pub async fn categories(&mut self) -> &[Category] {
        if self.categories.is_none() {
            let loaded = match self.api.list_categories().await {
                Ok(categories) => categories,
                Err(err) => {
                    self.notifications.notify(Notification::error(
                        "Failed to load categories",
                        err.user_message(),
                    ));
                    Vec::new()
                }
            };
            self.categories = Some(loaded);
        }
        self.categories.as_deref().unwrap_or_default()
    }

    pub fn form(&self) -> Option<&FormSession> {
        self.form.as_ref()
    }

    pub fn form_errors(&self) -> Option<&FormErrors> {
        self.form_errors.as_ref()
    }

    pub fn open_create(&mut self) {
        self.form = Some(FormSession::create());
        self.form_errors = None;
    }

    /// Opens an edit draft for a product on the current page.
    pub fn open_edit(&mut self, id: u64) -> bool {
        let product = self
            .query
            .current()
            .entry()
            .and_then(|entry| entry.products.iter().find(|p| p.id == id));
        let Some(product) = product else {
            self.notifications.notify(Notification::error(
                "Product not found",
                format!("Product {id} is not on the current page"),
            ));
            return false;
        };
        if has_malformed_images(product) {
            self.notifications.notify(Notification::error(
                "Malformed image data",
                "Check the product's image URLs before saving",
            ));
        }
        self.form = Some(FormSession::edit(product));
        self.form_errors = None;
        true
    }

    pub fn cancel_form(&mut self) {
        self.form = None;
        self.form_errors = None;
    }

    pub async fn submit_form(&mut self, draft: FormDraft) -> SubmitOutcome {
        let Some(form) = self.form.as_mut() else {
            return SubmitOutcome::NoForm;
        };
        form.set_draft(draft);
        let submission = match form.submission(self.edit_policy) {
            Ok(submission) => submission,
            Err(errors) => {
                self.form_errors = Some(errors.clone());
                return SubmitOutcome::Invalid(errors);
            }
        };
        self.form_errors = None;

        let result = match submission {
            Submission::Create(product) => {
                self.mutations
                    .create(product, &mut self.query, &mut self.form)
                    .await
            }
            Submission::Update { id, patch } => {
                self.mutations
                    .update(id, patch, &mut self.query, &mut self.form)
                    .await
            }
        };
        match result {
            Ok(product) => SubmitOutcome::Saved(product),
            Err(err) => SubmitOutcome::Rejected(err),
        }
    }

    pub async fn delete(&mut self, id: u64) -> Result<(), CatalogError> {
        self.mutations.delete(id, &mut self.query).await
    }
}
