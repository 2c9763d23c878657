use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use tera::Tera;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_admin::config::Config;
use catalog_admin::handlers::{CatalogApi, CatalogClient};
use catalog_admin::server::{self, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(api = %config.api_url, bind = %config.bind, "catalog admin v{}", env!("CARGO_PKG_VERSION"));

    let tera = Tera::new(&config.templates)
        .with_context(|| format!("failed to load templates from {}", config.templates))?;
    let api: Arc<dyn CatalogApi> = Arc::new(CatalogClient::new(&config.api_url)?);
    let state = web::Data::new(AppState::new(api, tera, config.panel_options()));
    let static_dir = config.static_dir.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(server::configure)
            .service(actix_files::Files::new("/static", &static_dir))
    })
    .bind(config.bind)
    .with_context(|| format!("failed to bind {}", config.bind))?
    .run()
    .await
    .context("server error")
}
