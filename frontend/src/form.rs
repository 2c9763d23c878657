//! Create/edit drafts for a single product.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{NewProduct, Product, ProductPatch};

static IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://[^\s/?#]+[^\s]*\.(?:jpe?g|png|gif)$").expect("image URL pattern")
});

static QUOTED_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']\s*,\s*["']"#).expect("separator pattern"));

/// Which fields an edit submission is allowed to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditPolicy {
    #[default]
    TitleAndPrice,
    FullRecord,
}

impl FromStr for EditPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title-price" | "title_price" => Ok(EditPolicy::TitleAndPrice),
            "full" | "full-record" => Ok(EditPolicy::FullRecord),
            other => Err(format!("unknown edit policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { id: u64 },
}

/// Raw field values exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "categoryId")]
    pub category_id: String,
    #[serde(default)]
    pub images: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", joined(.0))]
pub struct FormErrors(pub Vec<FieldError>);

fn joined(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl FormErrors {
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Create(NewProduct),
    Update { id: u64, patch: ProductPatch },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormSession {
    mode: FormMode,
    draft: FormDraft,
}

impl FormSession {
    pub fn create() -> Self {
        FormSession {
            mode: FormMode::Create,
            draft: FormDraft::default(),
        }
    }

    pub fn edit(product: &Product) -> Self {
        FormSession {
            mode: FormMode::Edit { id: product.id },
            draft: FormDraft {
                title: product.title.clone(),
                price: product.price.to_string(),
                description: product.description.clone(),
                category_id: product.category_id().to_string(),
                images: product.images.join("\n"),
            },
        }
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: FormDraft) {
        self.draft = draft;
    }

    /// Validates the fields this submission would send and builds the request.
    ///
    /// Edits under [`EditPolicy::TitleAndPrice`] only check title and price,
    /// since the other fields are left untouched on the server.
    pub fn submission(&self, policy: EditPolicy) -> Result<Submission, FormErrors> {
        let mut errors = Vec::new();
        let full = match self.mode {
            FormMode::Create => true,
            FormMode::Edit { .. } => policy == EditPolicy::FullRecord,
        };

        let title = required(&self.draft.title, "title", "Please enter the product title", &mut errors);
        let price = parse_price(&self.draft.price, &mut errors);
        let (description, category_id, images) = if full {
            (
                required(
                    &self.draft.description,
                    "description",
                    "Please enter the product description",
                    &mut errors,
                ),
                parse_category(&self.draft.category_id, &mut errors),
                parse_images(&self.draft.images, &mut errors),
            )
        } else {
            (None, None, None)
        };

        if !errors.is_empty() {
            return Err(FormErrors(errors));
        }

        // Every value below was checked above; missing ones only occur outside `full`.
        let submission = match self.mode {
            FormMode::Create => Submission::Create(NewProduct {
                title: title.unwrap_or_default(),
                price: price.unwrap_or_default(),
                description: description.unwrap_or_default(),
                category_id: category_id.unwrap_or_default(),
                images: images.unwrap_or_default(),
            }),
            FormMode::Edit { id } => Submission::Update {
                id,
                patch: ProductPatch {
                    title,
                    price,
                    description,
                    category_id,
                    images,
                },
            },
        };
        Ok(submission)
    }
}

fn required(
    value: &str,
    field: &'static str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(FieldError {
            field,
            message: message.to_string(),
        });
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_price(value: &str, errors: &mut Vec<FieldError>) -> Option<f64> {
    let raw = required(value, "price", "Please enter the product price", errors)?;
    match raw.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Some(price),
        _ => {
            errors.push(FieldError {
                field: "price",
                message: "Price must be a non-negative number".to_string(),
            });
            None
        }
    }
}

fn parse_category(value: &str, errors: &mut Vec<FieldError>) -> Option<u64> {
    let raw = required(value, "categoryId", "Please enter the category ID", errors)?;
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Some(id),
        _ => {
            errors.push(FieldError {
                field: "categoryId",
                message: "Category ID must be a positive integer".to_string(),
            });
            None
        }
    }
}

fn parse_images(value: &str, errors: &mut Vec<FieldError>) -> Option<Vec<String>> {
    let images = normalize_images(value);
    if images.is_empty() {
        errors.push(FieldError {
            field: "images",
            message: "Please enter an image URL".to_string(),
        });
        return None;
    }
    if let Some(bad) = images.iter().find(|url| !is_image_url(url)) {
        errors.push(FieldError {
            field: "images",
            message: format!("Not an http(s) image URL: {bad}"),
        });
        return None;
    }
    Some(images)
}

/// Splits pasted image input into clean entries, dropping the brackets and
/// quotes left over from copying an array literal.
///
/// Entries are one per line. A comma only separates entries when it sits
/// between quoted values, so URLs with commas in their path stay whole.
pub fn normalize_images(raw: &str) -> Vec<String> {
    raw.lines()
        .flat_map(|line| QUOTED_SEPARATOR.split(line))
        .map(|entry| {
            entry
                .trim()
                .trim_matches(|c| matches!(c, '[' | ']' | '"' | '\''))
                .trim()
                .to_string()
        })
        .filter(|entry| !entry.is_empty())
        .collect()
}

pub fn is_image_url(url: &str) -> bool {
    IMAGE_URL.is_match(url)
}

/// Stored images that still carry array-literal debris.
pub fn has_malformed_images(product: &Product) -> bool {
    product
        .images
        .iter()
        .any(|img| img.contains('[') || img.contains(']') || img.contains('"'))
}
