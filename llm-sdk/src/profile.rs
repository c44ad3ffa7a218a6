//! Named prompt profiles and `{placeholder}` template rendering
//!
//! A profile bundles the prompts and sampling parameters for one kind of
//! call. Built-in profiles can be replaced field by field with TOML files
//! named `{profile}.toml` in an agents directory.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::core::CompletionRequest;
use crate::error::{Result, ServiceError};

pub const THEME_DISCOVERY: &str = "theme_discovery";
pub const COMPLAINT_CLASSIFIER: &str = "complaint_classifier";
pub const COMPLAINT_CLASSIFIER_BATCH: &str = "complaint_classifier_batch";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Values substituted into a template, keyed by placeholder name
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    values: BTreeMap<String, String>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Substitute `{name}` placeholders; `{{` and `}}` produce literal braces.
///
/// A placeholder without a value is a configuration error.
pub fn render_template(template: &str, values: &TemplateValues) -> Result<String> {
    let mut missing: Vec<String> = Vec::new();

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| match caps.get(1) {
        Some(name) => match values.get(name.as_str()) {
            Some(value) => value.to_string(),
            None => {
                missing.push(name.as_str().to_string());
                String::new()
            }
        },
        None if &caps[0] == "{{" => "{".to_string(),
        None => "}".to_string(),
    });

    if !missing.is_empty() {
        missing.dedup();
        return Err(ServiceError::configuration(format!(
            "unresolved template placeholder(s): {}",
            missing.join(", ")
        )));
    }

    Ok(rendered.into_owned())
}

/// Prompts and sampling parameters for one kind of call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,

    /// Model override; the caller's default model applies when unset
    #[serde(default)]
    pub model: Option<String>,

    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl AgentProfile {
    /// Render both prompts into a request ready for a backend
    pub fn render(&self, default_model: &str, values: &TemplateValues) -> Result<CompletionRequest> {
        let system = render_template(&self.system, values)
            .map_err(|e| e.with_context_value("profile", &self.name))?;
        let user = render_template(&self.user, values)
            .map_err(|e| e.with_context_value("profile", &self.name))?;

        Ok(CompletionRequest {
            model: self.model.clone().unwrap_or_else(|| default_model.to_string()),
            system,
            user,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileOverride {
    model: Option<String>,
    system: Option<String>,
    user: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

/// Lookup table of profiles by name
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, AgentProfile>,
}

impl ProfileRegistry {
    /// The three profiles the pipeline ships with
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        for profile in [theme_discovery(), complaint_classifier(), complaint_classifier_batch()] {
            profiles.insert(profile.name.clone(), profile);
        }
        Self { profiles }
    }

    /// Apply `{name}.toml` overrides found in `dir`. A missing directory is not an error.
    pub fn with_overrides_from(mut self, dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            log::debug!("no agent overrides at {}", dir.display());
            return Ok(self);
        }

        for profile in self.profiles.values_mut() {
            let path = dir.join(format!("{}.toml", profile.name));
            if !path.is_file() {
                continue;
            }

            let raw = fs::read_to_string(&path).map_err(|e| {
                ServiceError::configuration(format!("cannot read {}: {}", path.display(), e))
            })?;
            let patch: ProfileOverride = toml::from_str(&raw).map_err(|e| {
                ServiceError::configuration(format!("invalid agent profile {}: {}", path.display(), e))
            })?;

            if let Some(model) = patch.model {
                profile.model = Some(model);
            }
            if let Some(system) = patch.system {
                profile.system = system;
            }
            if let Some(user) = patch.user {
                profile.user = user;
            }
            if let Some(temperature) = patch.temperature {
                profile.temperature = temperature;
            }
            if let Some(max_tokens) = patch.max_tokens {
                profile.max_tokens = max_tokens;
            }
            log::info!("loaded agent profile override {}", path.display());
        }

        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<&AgentProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| ServiceError::configuration(format!("unknown agent profile: {}", name)))
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn theme_discovery() -> AgentProfile {
    AgentProfile {
        name: THEME_DISCOVERY.to_string(),
        model: None,
        system: "You are an expert automotive customer-experience analyst. \
                 You read consumer complaints and identify the recurring problems behind them. \
                 Return only valid JSON."
            .to_string(),
        user: r#"Below is a random sample of consumer complaints about a car manufacturer.
Personal data has already been replaced by placeholders such as [NOME] or [CPF].

Identify between {min_categories} and {max_categories} recurring complaint themes.
Each theme must be specific enough to act on and distinct from the others.

Return a JSON array where each element has exactly these fields:
[
  {{
    "category_name": "short name in UPPER_SNAKE_CASE",
    "category_description": "one sentence describing what belongs in this category",
    "representative_examples": ["paraphrased example 1", "paraphrased example 2"]
  }}
]

Complaints:

{complaints_sample}"#
            .to_string(),
        temperature: 0.3,
        max_tokens: 3000,
    }
}

fn complaint_classifier() -> AgentProfile {
    AgentProfile {
        name: COMPLAINT_CLASSIFIER.to_string(),
        model: None,
        system: "You are a complaint classification system. Return only the category name.".to_string(),
        user: r#"Classify the complaint into exactly one of these categories:

{taxonomy_text}

Complaint:
{complaint_text}

Answer with the category name exactly as written above and nothing else."#
            .to_string(),
        temperature: 0.2,
        max_tokens: 500,
    }
}

fn complaint_classifier_batch() -> AgentProfile {
    AgentProfile {
        name: COMPLAINT_CLASSIFIER_BATCH.to_string(),
        model: None,
        system: "You are a complaint classification system. Return only valid JSON.".to_string(),
        user: r#"Classify each complaint below into exactly one of these categories:

{taxonomy_text}

Complaints:

{complaints_text}

Return a JSON array with one element per complaint, using the category name exactly as written above:
[{{"complaint_id": "...", "assigned_category": "..."}}]"#
            .to_string(),
        temperature: 0.1,
        max_tokens: 1000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_placeholders_and_escapes() {
        let values = TemplateValues::new().set("name", "Ana").set("n", 3);
        let rendered = render_template("{{\"who\": \"{name}\"}} x{n} {{n}}", &values).unwrap();
        assert_eq!(rendered, "{\"who\": \"Ana\"} x3 {n}");
    }

    #[test]
    fn stray_braces_are_literal() {
        let rendered = render_template("a { b } {1}", &TemplateValues::new()).unwrap();
        assert_eq!(rendered, "a { b } {1}");
    }

    #[test]
    fn missing_placeholder_is_configuration_error() {
        let err = render_template("hello {who} and {other}", &TemplateValues::new()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("who"));
        assert!(err.to_string().contains("other"));
    }

    #[test]
    fn builtin_profiles_render_with_expected_values() {
        let registry = ProfileRegistry::builtin();

        let discovery = registry.get(THEME_DISCOVERY).unwrap();
        let request = discovery
            .render(
                "gpt-4o-mini",
                &TemplateValues::new()
                    .set("min_categories", 5)
                    .set("max_categories", 10)
                    .set("complaints_sample", "Complaint COMPLAINT_1:\nTitle: t\nText: b"),
            )
            .unwrap();
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 3000);
        assert!(request.user.contains("between 5 and 10"));
        assert!(request.user.contains("\"category_name\""));

        let single = registry.get(COMPLAINT_CLASSIFIER).unwrap();
        assert_eq!((single.temperature, single.max_tokens), (0.2, 500));

        let batch = registry.get(COMPLAINT_CLASSIFIER_BATCH).unwrap();
        assert_eq!((batch.temperature, batch.max_tokens), (0.1, 1000));
        let request = batch
            .render(
                "gpt-4o",
                &TemplateValues::new()
                    .set("taxonomy_text", "- A: a")
                    .set("complaints_text", "ID: X"),
            )
            .unwrap();
        assert!(request.user.contains("[{\"complaint_id\""));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        assert!(ProfileRegistry::builtin().get("nope").is_err());
    }
}
