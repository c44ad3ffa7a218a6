//! Taxonomy artifacts
//!
//! A proposed taxonomy is the LLM's suggestion and is meant to be edited by a
//! human. A curated taxonomy is the frozen result of that edit and is the only
//! form the classifier accepts.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Curation state recorded on taxonomy artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyStatus {
    AwaitingCuration,
    Curated,
}

/// Structural problems with a taxonomy
#[derive(Debug, Error, PartialEq)]
pub enum TaxonomyError {
    #[error("taxonomy is still awaiting curation")]
    NotCurated,

    #[error("taxonomy has no categories")]
    Empty,

    #[error("category name is blank")]
    BlankName,

    #[error("duplicate category name: {0}")]
    DuplicateName(String),

    #[error("malformed taxonomy: {0}")]
    Malformed(String),
}

/// A category as proposed by the discovery step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedCategory {
    #[serde(alias = "category_name")]
    pub name: String,

    #[serde(alias = "category_description", default)]
    pub description: String,

    #[serde(default)]
    pub representative_examples: Vec<String>,
}

/// Proposed taxonomy artifact, written by phase 2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTaxonomy {
    pub sample_size: usize,
    pub total_complaints: usize,
    pub status: TaxonomyStatus,
    pub proposed_categories: Vec<ProposedCategory>,
}

impl ProposedTaxonomy {
    pub fn new(
        sample_size: usize,
        total_complaints: usize,
        proposed_categories: Vec<ProposedCategory>,
    ) -> Self {
        Self {
            sample_size,
            total_complaints,
            status: TaxonomyStatus::AwaitingCuration,
            proposed_categories,
        }
    }
}

/// A curated category: name and description only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(alias = "category_name")]
    pub name: String,

    #[serde(alias = "category_description", default)]
    pub description: String,
}

impl Category {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// The frozen category set the classifier works against.
///
/// Construction validates that the set is non-empty and that names are
/// non-blank and unique. There is no way to mutate a `CuratedTaxonomy` after
/// it has been built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CuratedTaxonomy {
    categories: Vec<Category>,
}

#[derive(Deserialize)]
struct CuratedEnvelope {
    #[serde(default)]
    status: Option<TaxonomyStatus>,
    categories: Vec<Category>,
}

impl CuratedTaxonomy {
    pub fn new(categories: Vec<Category>) -> Result<Self, TaxonomyError> {
        if categories.is_empty() {
            return Err(TaxonomyError::Empty);
        }

        let mut seen = HashSet::new();
        for category in &categories {
            if category.name.trim().is_empty() {
                return Err(TaxonomyError::BlankName);
            }
            if !seen.insert(category.name.as_str()) {
                return Err(TaxonomyError::DuplicateName(category.name.clone()));
            }
        }

        Ok(Self { categories })
    }

    /// Parse a curated taxonomy artifact.
    ///
    /// Accepts a bare array of categories or an object
    /// `{"status": "curated", "categories": [...]}`. Anything that still
    /// looks like a proposal (an `awaiting_curation` status or a
    /// `proposed_categories` key) is rejected with `NotCurated`.
    pub fn from_json(contents: &str) -> Result<Self, TaxonomyError> {
        let value: Value = serde_json::from_str(contents)
            .map_err(|e| TaxonomyError::Malformed(e.to_string()))?;

        match value {
            Value::Array(_) => {
                let categories: Vec<Category> = serde_json::from_value(value)
                    .map_err(|e| TaxonomyError::Malformed(e.to_string()))?;
                Self::new(categories)
            }
            Value::Object(ref map) => {
                if map.contains_key("proposed_categories") {
                    return Err(TaxonomyError::NotCurated);
                }
                if map.get("status").and_then(Value::as_str) == Some("awaiting_curation") {
                    return Err(TaxonomyError::NotCurated);
                }

                let envelope: CuratedEnvelope = serde_json::from_value(value)
                    .map_err(|e| TaxonomyError::Malformed(e.to_string()))?;
                match envelope.status {
                    Some(TaxonomyStatus::AwaitingCuration) => Err(TaxonomyError::NotCurated),
                    _ => Self::new(envelope.categories),
                }
            }
            _ => Err(TaxonomyError::Malformed(
                "expected an array of categories or a curated taxonomy object".to_string(),
            )),
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Exact, case-sensitive membership test
    pub fn contains(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c.name == name)
    }

    /// Render as `- name: description` lines, one per category
    pub fn render_lines(&self) -> String {
        self.categories
            .iter()
            .map(|c| format!("- {}: {}", c.name, c.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
