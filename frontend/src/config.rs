use std::net::SocketAddr;

use anyhow::{Context, Result};
use chrono::TimeDelta;

use crate::form::EditPolicy;
use crate::handlers::DEFAULT_API_URL;
use crate::panel::PanelOptions;

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_TEMPLATES: &str = "public/**/*.html";
const DEFAULT_STATIC_DIR: &str = "public/static";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub bind: SocketAddr,
    pub templates: String,
    pub static_dir: String,
    pub edit_policy: EditPolicy,
    pub stale_after: Option<TimeDelta>,
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind = get("ADMIN_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind
            .trim()
            .parse::<SocketAddr>()
            .with_context(|| format!("ADMIN_BIND is not a socket address: {bind}"))?;

        let edit_policy = match get("CATALOG_EDIT_POLICY") {
            Some(raw) => raw
                .parse::<EditPolicy>()
                .map_err(anyhow::Error::msg)
                .context("invalid CATALOG_EDIT_POLICY")?,
            None => EditPolicy::default(),
        };

        let stale_after = match get("CATALOG_STALE_SECS") {
            Some(raw) => {
                let secs = raw
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("CATALOG_STALE_SECS is not a number: {raw}"))?;
                if secs < 0 {
                    anyhow::bail!("CATALOG_STALE_SECS must not be negative: {raw}");
                }
                Some(TimeDelta::try_seconds(secs).context("CATALOG_STALE_SECS out of range")?)
            }
            None => None,
        };

        Ok(Config {
            api_url: get("CATALOG_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            bind,
            templates: get("ADMIN_TEMPLATES").unwrap_or_else(|| DEFAULT_TEMPLATES.to_string()),
            static_dir: get("ADMIN_STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
            edit_policy,
            stale_after,
        })
    }

    pub fn panel_options(&self) -> PanelOptions {
        PanelOptions {
            edit_policy: self.edit_policy,
            stale_after: self.stale_after,
        }
    }
}
