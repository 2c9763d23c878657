use serde::Deserialize;

use super::Pagination;
use crate::models::Filter;

/// A partial filter update.
///
/// Outer `None`: field untouched. `Some(None)`: constraint cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub title: Option<Option<String>>,
    pub category_id: Option<Option<u64>>,
    pub price_min: Option<Option<f64>>,
    pub price_max: Option<Option<f64>>,
}

/// Free-form filter input as typed into the search bar.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFilterInput {
    pub title: Option<String>,
    #[serde(rename = "categoryId")]
    pub category_id: Option<String>,
    pub price_min: Option<String>,
    pub price_max: Option<String>,
}

impl FilterPatch {
    pub fn title(value: impl Into<String>) -> Self {
        FilterPatch {
            title: Some(non_blank(value.into())),
            ..Default::default()
        }
    }

    pub fn category(value: Option<u64>) -> Self {
        FilterPatch {
            category_id: Some(value),
            ..Default::default()
        }
    }

    /// Coerces raw text into a patch. Fields missing from the input stay
    /// untouched; blank or non-numeric input clears the constraint.
    pub fn from_raw(input: RawFilterInput) -> Self {
        FilterPatch {
            title: input.title.map(non_blank),
            category_id: input
                .category_id
                .map(|v| v.trim().parse::<u64>().ok().filter(|id| *id > 0)),
            price_min: input.price_min.map(|v| parse_price(&v)),
            price_max: input.price_max.map(|v| parse_price(&v)),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_price(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p >= 0.0)
}

#[derive(Debug, Clone, Default)]
pub struct FilterState {
    current: Filter,
}

impl FilterState {
    pub fn current(&self) -> &Filter {
        &self.current
    }

    /// Merges `patch` into the active filter and sends the list back to page 1.
    pub fn apply_partial_filter(&mut self, patch: FilterPatch, pagination: &mut Pagination) {
        if let Some(title) = patch.title {
            self.current.title = title;
        }
        if let Some(category_id) = patch.category_id {
            self.current.category_id = category_id;
        }
        if let Some(price_min) = patch.price_min {
            self.current.price_min = price_min;
        }
        if let Some(price_max) = patch.price_max {
            self.current.price_max = price_max;
        }
        pagination.reset_to_first_page();
        tracing::debug!(filter = ?self.current, "filter updated");
    }
}
