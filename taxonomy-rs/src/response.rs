//! Typed parsing of model responses
//!
//! Responses are validated right here, at the boundary: anything that does
//! not fit the expected shape becomes a [`ResponseError`] and never reaches
//! the rest of the pipeline as loose JSON.

use std::collections::HashSet;

use complaint_types::ProposedCategory;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("response contains no categories")]
    NoCategories,

    #[error("category {0} has a blank name")]
    BlankName(usize),

    #[error("duplicate category name: {0}")]
    DuplicateName(String),

    #[error("empty answer")]
    EmptyAnswer,
}

/// Drop a surrounding Markdown code fence, with or without a language tag
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string ("json") up to the end of the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a taxonomy proposal: a bare array or `{"proposed_categories": [...]}`
pub fn parse_proposal(text: &str) -> Result<Vec<ProposedCategory>, ResponseError> {
    let value: Value =
        serde_json::from_str(strip_code_fences(text)).map_err(|e| ResponseError::InvalidJson(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("proposed_categories").or_else(|| map.remove("categories")) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ResponseError::Shape(
                    "object without a proposed_categories array".to_string(),
                ))
            }
        },
        _ => return Err(ResponseError::Shape("expected an array of categories".to_string())),
    };

    let mut categories = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let mut category: ProposedCategory =
            serde_json::from_value(item).map_err(|e| ResponseError::Shape(format!("category {}: {}", index + 1, e)))?;
        category.name = category.name.trim().to_string();
        category.description = category.description.trim().to_string();
        categories.push(category);
    }

    if categories.is_empty() {
        return Err(ResponseError::NoCategories);
    }

    let mut seen = HashSet::new();
    for (index, category) in categories.iter().enumerate() {
        if category.name.is_empty() {
            return Err(ResponseError::BlankName(index + 1));
        }
        if !seen.insert(category.name.as_str()) {
            return Err(ResponseError::DuplicateName(category.name.clone()));
        }
    }

    Ok(categories)
}

/// One entry of a batch classification answer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchAssignment {
    #[serde(deserialize_with = "id_as_string")]
    pub complaint_id: String,
    #[serde(alias = "category")]
    pub assigned_category: String,
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid complaint_id: {}", other))),
    }
}

/// Parse a batch answer: `[{"complaint_id", "assigned_category"}]`, also inside an object
pub fn parse_batch(text: &str) -> Result<Vec<BatchAssignment>, ResponseError> {
    let value: Value =
        serde_json::from_str(strip_code_fences(text)).map_err(|e| ResponseError::InvalidJson(e.to_string()))?;

    let items = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map
            .remove("classification_results")
            .or_else(|| map.remove("results"))
            .ok_or_else(|| ResponseError::Shape("object without a results array".to_string()))?,
        _ => return Err(ResponseError::Shape("expected an array of assignments".to_string())),
    };

    let mut assignments: Vec<BatchAssignment> =
        serde_json::from_value(items).map_err(|e| ResponseError::Shape(e.to_string()))?;
    for assignment in &mut assignments {
        assignment.assigned_category = normalize_category(&assignment.assigned_category);
    }
    Ok(assignments)
}

/// Clean a bare category answer: whitespace, quotes, backticks and a trailing period
pub fn normalize_category(text: &str) -> String {
    strip_code_fences(text)
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .trim()
        .trim_end_matches('.')
        .trim()
        .to_string()
}

/// Parse a single-complaint answer
pub fn parse_single(text: &str) -> Result<String, ResponseError> {
    let name = normalize_category(text);
    if name.is_empty() {
        return Err(ResponseError::EmptyAnswer);
    }
    Ok(name)
}
