//! Admin panel for a remote product catalog.
//!
//! The list, filter, pagination and edit-form lifecycle lives in plain
//! library types ([`panel::ProductsPanel`] and the coordinators it owns);
//! [`server`] puts actix-web pages in front of them.

pub mod config;
pub mod error;
pub mod form;
pub mod handlers;
pub mod models;
pub mod mutation;
pub mod notify;
pub mod panel;
pub mod query;
pub mod server;
pub mod session;
pub mod state;

pub use error::{CatalogError, CatalogResult};
pub use handlers::{CatalogApi, CatalogClient};
