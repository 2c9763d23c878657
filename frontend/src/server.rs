//! Server-rendered admin pages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use actix_web::cookie::Cookie;
use chrono::{DateTime, TimeDelta, Utc};
use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder, get, http::header, post, web};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};

use crate::form::{EditPolicy, FieldError, FormDraft, FormMode};
use crate::handlers::CatalogApi;
use crate::models::{Category, Credentials, Product};
use crate::panel::{PanelOptions, ProductsPanel, SubmitOutcome};
use crate::query::QueryState;
use crate::session::{MemorySession, RouteGuard, SessionProvider};
use crate::state::{FilterPatch, RawFilterInput};

pub const TOKEN_COOKIE: &str = "token";

/// Panels kept in memory at once. The least recently used is dropped first.
pub const MAX_PANELS: usize = 256;
const PANEL_IDLE_MINUTES: i64 = 30;

type SharedPanel = Arc<tokio::sync::Mutex<ProductsPanel>>;

struct PanelSlot {
    panel: SharedPanel,
    last_seen: DateTime<Utc>,
}

pub struct AppState {
    api: Arc<dyn CatalogApi>,
    tera: Tera,
    options: PanelOptions,
    panels: Mutex<HashMap<String, PanelSlot>>,
    max_panels: usize,
    idle_after: TimeDelta,
}

impl AppState {
    pub fn new(api: Arc<dyn CatalogApi>, tera: Tera, options: PanelOptions) -> Self {
        AppState {
            api,
            tera,
            options,
            panels: Mutex::new(HashMap::new()),
            max_panels: MAX_PANELS,
            idle_after: TimeDelta::minutes(PANEL_IDLE_MINUTES),
        }
    }

    /// Panel for `token`, created on first use. Panels idle past
    /// `idle_after` are dropped, and the map never holds more than
    /// `max_panels` entries.
    fn panel(&self, token: &str) -> SharedPanel {
        let mut panels = match self.panels.lock() {
            Ok(panels) => panels,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Utc::now();
        let idle_after = self.idle_after;
        panels.retain(|_, slot| now - slot.last_seen <= idle_after);

        if !panels.contains_key(token) {
            while panels.len() >= self.max_panels.max(1) {
                let oldest = panels
                    .iter()
                    .min_by_key(|(_, slot)| slot.last_seen)
                    .map(|(key, _)| key.clone());
                let Some(oldest) = oldest else {
                    break;
                };
                panels.remove(&oldest);
                tracing::debug!("evicted least recently used panel");
            }
        }

        let slot = panels.entry(token.to_string()).or_insert_with(|| PanelSlot {
            panel: Arc::new(tokio::sync::Mutex::new(ProductsPanel::new(
                self.api.clone(),
                self.options,
            ))),
            last_seen: now,
        });
        slot.last_seen = now;
        slot.panel.clone()
    }

    fn drop_panel(&self, token: &str) {
        let mut panels = match self.panels.lock() {
            Ok(panels) => panels,
            Err(poisoned) => poisoned.into_inner(),
        };
        panels.remove(token);
    }

    fn render(&self, template: &str, context: &Context) -> HttpResponse {
        match self.tera.render(template, context) {
            Ok(html) => HttpResponse::Ok().content_type("text/html").body(html),
            Err(err) => {
                tracing::error!(template, error = ?err, "template render failed");
                HttpResponse::InternalServerError().body("Template render error")
            }
        }
    }
}

/// Token carried in a browser cookie. Changes are written back as
/// `Set-Cookie` on the response.
pub struct CookieSession {
    initial: Option<String>,
    inner: MemorySession,
}

impl CookieSession {
    pub fn from_request(req: &HttpRequest) -> Self {
        let initial = req
            .cookie(TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty());
        let inner = MemorySession::new();
        if let Some(token) = &initial {
            inner.set(token.clone());
        }
        CookieSession { initial, inner }
    }

    fn write_back(&self, response: &mut HttpResponseBuilder) {
        let current = self.inner.get();
        if current == self.initial {
            return;
        }
        match current {
            Some(token) => {
                response.cookie(
                    Cookie::build(TOKEN_COOKIE, token)
                        .path("/")
                        .http_only(true)
                        .finish(),
                );
            }
            None => {
                let mut removal = Cookie::build(TOKEN_COOKIE, "").path("/").finish();
                removal.make_removal();
                response.cookie(removal);
            }
        }
    }
}

impl SessionProvider for CookieSession {
    fn get(&self) -> Option<String> {
        self.inner.get()
    }

    fn set(&self, token: String) {
        self.inner.set(token);
    }

    fn clear(&self) {
        self.inner.clear();
    }
}

fn redirect(location: &str, session: Option<&CookieSession>) -> HttpResponse {
    let mut response = HttpResponse::Found();
    response.append_header((header::LOCATION, location));
    if let Some(session) = session {
        session.write_back(&mut response);
    }
    response.finish()
}

/// The signed-in user's panel, or `None` when the guard turns the request away.
fn guarded_panel(state: &AppState, session: &CookieSession) -> Option<SharedPanel> {
    if !RouteGuard::allows(session) {
        return None;
    }
    session.get().map(|token| state.panel(&token))
}

#[derive(Deserialize)]
struct LoginPageQuery {
    error: Option<String>,
}

#[get("/")]
async fn login_page(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<LoginPageQuery>,
) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    if RouteGuard::allows(&session) {
        return redirect("/dashboard", None);
    }
    let mut context = Context::new();
    if let Some(error) = &query.error {
        context.insert("error", error);
    }
    state.render("login.html", &context)
}

#[post("/login")]
async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<Credentials>,
) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    match state.api.login(&form).await {
        Ok(tokens) => {
            tracing::info!(email = %form.email, "signed in");
            session.set(tokens.access_token);
            redirect("/dashboard", Some(&session))
        }
        Err(err) => {
            tracing::warn!(email = %form.email, error = %err, "sign-in failed");
            let message = match &err {
                crate::error::CatalogError::Network(_) => "No response from server".to_string(),
                other => other.user_message(),
            };
            redirect(&format!("/?error={}", urlencoding::encode(&message)), None)
        }
    }
}

#[get("/logout")]
async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    if let Some(token) = session.get() {
        state.drop_panel(&token);
    }
    session.clear();
    redirect("/", Some(&session))
}

#[derive(Deserialize)]
struct DashboardQuery {
    page: Option<u32>,
}

#[derive(Serialize)]
struct FormView<'a> {
    editing: Option<u64>,
    draft: &'a FormDraft,
    errors: Vec<FieldError>,
}

#[get("/dashboard")]
async fn dashboard(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<DashboardQuery>,
) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    let Some(panel) = guarded_panel(&state, &session) else {
        return redirect("/", None);
    };
    let mut panel = panel.lock().await;
    if let Some(page) = query.page {
        panel.set_page(page);
    }

    let categories: Vec<Category> = panel.categories().await.to_vec();
    let list = panel.load().await.clone();

    let mut context = Context::new();
    let (products, loading, error): (Vec<Product>, bool, Option<String>) = match list {
        QueryState::Ready(entry) => (entry.products, false, None),
        QueryState::Failed(err) => (Vec::new(), false, Some(err.user_message())),
        QueryState::Loading | QueryState::Idle => (Vec::new(), true, None),
    };
    let page = panel.pagination().page();
    context.insert("products", &products);
    context.insert("loading", &loading);
    context.insert("list_error", &error);
    context.insert("page", &page);
    context.insert("has_prev", &(page > 1));
    context.insert("has_next", &panel.has_next_page());
    context.insert("filter", panel.filter().current());
    context.insert("categories", &categories);
    if let Some(form) = panel.form() {
        let locked = matches!(form.mode(), FormMode::Edit { .. })
            && panel.edit_policy() == EditPolicy::TitleAndPrice;
        context.insert("form_locked", &locked);
        let view = FormView {
            editing: match form.mode() {
                FormMode::Create => None,
                FormMode::Edit { id } => Some(id),
            },
            draft: form.draft(),
            errors: panel.form_errors().map(|e| e.0.clone()).unwrap_or_default(),
        };
        context.insert("form", &view);
    }
    context.insert("notifications", &panel.notifications().drain());

    state.render("dashboard.html", &context)
}

#[get("/dashboard/filter")]
async fn apply_filter(
    req: HttpRequest,
    state: web::Data<AppState>,
    input: web::Query<RawFilterInput>,
) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    let Some(panel) = guarded_panel(&state, &session) else {
        return redirect("/", None);
    };
    panel
        .lock()
        .await
        .apply_filter(FilterPatch::from_raw(input.into_inner()));
    redirect("/dashboard", None)
}

#[get("/dashboard/retry")]
async fn retry_list(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    let Some(panel) = guarded_panel(&state, &session) else {
        return redirect("/", None);
    };
    panel.lock().await.retry().await;
    redirect("/dashboard", None)
}

#[get("/dashboard/products/new")]
async fn new_product(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    let Some(panel) = guarded_panel(&state, &session) else {
        return redirect("/", None);
    };
    panel.lock().await.open_create();
    redirect("/dashboard", None)
}

#[get("/dashboard/products/{id}/edit")]
async fn edit_product(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<u64>,
) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    let Some(panel) = guarded_panel(&state, &session) else {
        return redirect("/", None);
    };
    panel.lock().await.open_edit(id.into_inner());
    redirect("/dashboard", None)
}

#[get("/dashboard/form/cancel")]
async fn cancel_form(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    let Some(panel) = guarded_panel(&state, &session) else {
        return redirect("/", None);
    };
    panel.lock().await.cancel_form();
    redirect("/dashboard", None)
}

#[post("/dashboard/products")]
async fn submit_product(
    req: HttpRequest,
    state: web::Data<AppState>,
    draft: web::Form<FormDraft>,
) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    let Some(panel) = guarded_panel(&state, &session) else {
        return redirect("/", None);
    };
    let outcome = panel.lock().await.submit_form(draft.into_inner()).await;
    match outcome {
        SubmitOutcome::Saved(product) => tracing::info!(id = product.id, "product saved"),
        SubmitOutcome::Invalid(errors) => tracing::debug!(%errors, "form rejected"),
        SubmitOutcome::Rejected(err) => tracing::debug!(error = %err, "catalog rejected form"),
        SubmitOutcome::NoForm => tracing::debug!("submit without an open form"),
    }
    redirect("/dashboard", None)
}

#[post("/dashboard/products/{id}/delete")]
async fn delete_product(
    req: HttpRequest,
    state: web::Data<AppState>,
    id: web::Path<u64>,
) -> HttpResponse {
    let session = CookieSession::from_request(&req);
    let Some(panel) = guarded_panel(&state, &session) else {
        return redirect("/", None);
    };
    let id = id.into_inner();
    if panel.lock().await.delete(id).await.is_ok() {
        tracing::info!(id, "product deleted");
    }
    redirect("/dashboard", None)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(login_page)
        .service(login)
        .service(logout)
        .service(dashboard)
        .service(apply_filter)
        .service(retry_list)
        .service(new_product)
        .service(edit_product)
        .service(cancel_form)
        .service(submit_product)
        .service(delete_product);
}
