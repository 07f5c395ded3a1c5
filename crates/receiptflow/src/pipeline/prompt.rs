//! Prompt rendering.
//!
//! Templates are checked for unknown `@tokens` when the settings file is
//! loaded, so rendering itself never rejects a template. A token that is
//! not a known variable is left in place.

use serde::Serialize;
use thiserror::Error;

use crate::config::template::{variable_regex, TemplateVariable};

/// Prompt shipped with a fresh installation.
pub const DEFAULT_PROMPT: &str = r#"Find the receipt's name, total cost, and date. Format the found data as:
{
	"name": store name,
	"amount": amount as a number,
	"date": date in ISO 8601 format in UTC with ALL time values set as 0,
	"categories": categories,
	"tags": tags
}
If a store name cannot be confidently found, use 'Default store name' as the default name.
Omit any value if not found with confidence. Assume the date is in the year @currentYear if not provided.
The amount must be a float or integer.

Return only valid JSON, in plain text, never inside a code block.

Choose up to 2 categories from the given list based on the receipt's items and store name. If no categories fit, return an empty array. Select only the id, like:
{
	"id": category id
}

Use the description of each category to fine tune the choice. If there are no categories to choose from, make categories an empty array. Likewise for tags.

Categories to choose from: @categories

Choose tags the same way as categories.

Tags to choose from: @tags

Receipt text: @ocrText
"#;

#[derive(Error, Debug)]
#[error("Failed to load {kind}: {message}")]
pub struct CatalogError {
    pub kind: &'static str,
    pub message: String,
}

impl CatalogError {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A category or tag offered to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CatalogEntry {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Categories and tags the model may choose from.
pub trait ReceiptCatalog: Send + Sync {
    fn categories(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
    fn tags(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    categories: Vec<CatalogEntry>,
    tags: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(categories: Vec<CatalogEntry>, tags: Vec<CatalogEntry>) -> Self {
        Self { categories, tags }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl ReceiptCatalog for StaticCatalog {
    fn categories(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self.categories.clone())
    }

    fn tags(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self.tags.clone())
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone)]
pub struct PromptVariables {
    pub categories: String,
    pub tags: String,
    pub ocr_text: String,
    pub current_year: i32,
}

impl PromptVariables {
    /// Serializes the catalog as JSON arrays. Tags carry only id and name.
    pub fn from_catalog(
        catalog: &dyn ReceiptCatalog,
        ocr_text: &str,
        current_year: i32,
    ) -> Result<Self, CatalogError> {
        let categories = catalog.categories()?;
        let tags: Vec<CatalogEntry> = catalog
            .tags()?
            .into_iter()
            .map(|t| CatalogEntry::new(t.id, t.name))
            .collect();

        Ok(Self {
            categories: to_json("categories", &categories)?,
            tags: to_json("tags", &tags)?,
            ocr_text: ocr_text.to_string(),
            current_year,
        })
    }

    fn value(&self, variable: TemplateVariable) -> String {
        match variable {
            TemplateVariable::Categories => self.categories.clone(),
            TemplateVariable::Tags => self.tags.clone(),
            TemplateVariable::OcrText => self.ocr_text.clone(),
            TemplateVariable::CurrentYear => self.current_year.to_string(),
        }
    }
}

fn to_json(kind: &'static str, entries: &[CatalogEntry]) -> Result<String, CatalogError> {
    serde_json::to_string(entries).map_err(|e| CatalogError::new(kind, e.to_string()))
}

/// Substitutes every known `@variable` in a single pass, so substituted
/// values (OCR text in particular) are never themselves expanded.
pub fn render_prompt(template: &str, variables: &PromptVariables) -> String {
    variable_regex()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let token = &caps[0];
            match TemplateVariable::from_token(token) {
                Some(variable) => variables.value(variable),
                None => token.to_string(),
            }
        })
        .into_owned()
}
