//! Parsing the model's answer into a [`StructuredReceipt`].

use chrono::{DateTime, NaiveDate};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::StageError;

/// Longest error text kept in a stage description.
pub const MAX_DESCRIPTION_CHARS: usize = 2048;

/// Reference to a category or tag by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(alias = "Id", alias = "ID")]
    pub id: i64,
}

/// Receipt fields extracted by the model. Missing fields stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredReceipt {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub categories: Vec<EntityRef>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<EntityRef>,
}

/// Strips markdown code fences some models wrap around JSON.
pub fn clean_response(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

pub fn parse_receipt(raw: &str) -> Result<StructuredReceipt, StageError> {
    let cleaned = clean_response(raw);
    if cleaned.is_empty() {
        return Err(StageError::Parse("empty response".to_string()));
    }
    serde_json::from_str(cleaned).map_err(|e| StageError::Parse(e.to_string()))
}

/// Truncates to [`MAX_DESCRIPTION_CHARS`] characters, never splitting one.
pub fn truncate_description(text: &str) -> String {
    match text.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Description stored for a failed chat-completion stage.
pub fn failure_description(error: &StageError, raw_response: &str) -> String {
    format!(
        "Error: {}; RawResponse: {}",
        truncate_description(&error.to_string()),
        raw_response
    )
}

fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => {
            let s = s.trim().trim_start_matches('$').replace(',', "");
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid amount '{}'", s)))
        }
        other => Err(de::Error::custom(format!("invalid amount {}", other))),
    }
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
        return Ok(Some(dt.date_naive()));
    }
    // Date part of anything that starts with YYYY-MM-DD.
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid date '{}'", value)))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<EntityRef>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<EntityRef>>::deserialize(deserializer)?.unwrap_or_default())
}
