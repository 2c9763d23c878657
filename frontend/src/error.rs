//! Errors returned by the catalog client and everything layered on it.

use thiserror::Error;

pub const GENERIC_FAILURE: &str = "An unexpected error occurred";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    /// No response was received at all.
    #[error("network error: {0}")]
    Network(String),

    #[error("catalog error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The service rejected a create/update payload. The message is the service's own.
    #[error("{0}")]
    Validation(String),

    #[error("product {0} not found")]
    NotFound(u64),

    #[error("invalid response from catalog: {0}")]
    InvalidResponse(String),
}

impl CatalogError {
    /// Message shown to the user in a notification description.
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::Remote { message, .. } | CatalogError::Validation(message)
                if !message.trim().is_empty() =>
            {
                message.clone()
            }
            CatalogError::NotFound(id) => format!("Product {id} no longer exists"),
            CatalogError::Network(_) => "No response from the catalog service".to_string(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CatalogError::InvalidResponse(err.to_string())
        } else {
            CatalogError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::InvalidResponse(err.to_string())
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_service_text() {
        let err = CatalogError::Validation("price must be a positive number".into());
        assert_eq!(err.user_message(), "price must be a positive number");

        let err = CatalogError::Remote {
            status: 500,
            message: "  ".into(),
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE);
    }
}
