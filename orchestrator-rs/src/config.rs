// orchestrator-rs/src/config.rs
// Pipeline configuration: defaults, then a TOML file, then environment overrides

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use collector::{CollectionOptions, DEFAULT_USER_AGENT};
use llm_sdk::{ConfigProvider, ConfigProviderExt, RetryConfig};
use serde::{Deserialize, Serialize};
use taxonomy::{ClassifierOptions, ProposerOptions};

/// Prefix of environment overrides, e.g. `PIPELINE_COLLECTION_PAGE_CEILING`
pub const ENV_PREFIX: &str = "PIPELINE";

/// Credential key, read without the prefix (`OPENAI_API_KEY`)
pub const CREDENTIAL_KEY: &str = "openai_api_key";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Complete, immutable pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub collection: CollectionConfig,
    pub discovery: DiscoveryConfig,
    pub classification: ClassificationConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Directory of `{profile}.toml` prompt overrides
    pub agents_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            agents_dir: PathBuf::from("agents"),
        }
    }
}

impl PathsConfig {
    pub fn raw_complaints(&self) -> PathBuf {
        self.data_dir.join("complaints_raw.json")
    }

    pub fn partial_complaints(&self) -> PathBuf {
        self.data_dir.join("complaints_raw.partial.json")
    }

    pub fn proposed_taxonomy(&self) -> PathBuf {
        self.output_dir.join("proposed_taxonomy.json")
    }

    pub fn curated_taxonomy(&self) -> PathBuf {
        self.output_dir.join("curated_taxonomy.json")
    }

    pub fn classification_results(&self) -> PathBuf {
        self.output_dir.join("classification_results.json")
    }

    pub fn usage_log(&self) -> PathBuf {
        self.output_dir.join("llm_usage.jsonl")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionConfig {
    /// Company page on the complaint site
    pub base_url: String,
    pub page_ceiling: u32,
    pub request_delay_ms: u64,
    pub attempts_per_strategy: u32,
    pub http_timeout_secs: u64,
    pub browser_timeout_secs: u64,
    pub browser_binary: Option<PathBuf>,
    pub user_agent: Option<String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.reclameaqui.com.br/empresa/mercedes-benz-cars-e-vans".to_string(),
            page_ceiling: 20,
            request_delay_ms: 2_000,
            attempts_per_strategy: 1,
            http_timeout_secs: 30,
            browser_timeout_secs: 60,
            browser_binary: None,
            user_agent: None,
        }
    }
}

impl CollectionConfig {
    pub fn options(&self) -> CollectionOptions {
        CollectionOptions {
            base_url: self.base_url.clone(),
            page_ceiling: self.page_ceiling,
            delay: Duration::from_millis(self.request_delay_ms),
            attempts_per_strategy: self.attempts_per_strategy,
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            browser_timeout: Duration::from_secs(self.browser_timeout_secs),
            browser_binary: self.browser_binary.clone(),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    pub sample_size: usize,
    pub min_categories: usize,
    pub max_categories: usize,
    pub seed: Option<u64>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let defaults = ProposerOptions::default();
        Self {
            sample_size: defaults.sample_size,
            min_categories: defaults.min_categories,
            max_categories: defaults.max_categories,
            seed: None,
        }
    }
}

impl DiscoveryConfig {
    pub fn options(&self) -> ProposerOptions {
        ProposerOptions {
            sample_size: self.sample_size,
            min_categories: self.min_categories,
            max_categories: self.max_categories,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassificationConfig {
    pub batch_size: usize,
    pub batch_threshold: usize,
    pub max_concurrency: usize,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
    pub excerpt_chars: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_threshold: 20,
            max_concurrency: 4,
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
            excerpt_chars: 500,
        }
    }
}

impl ClassificationConfig {
    pub fn options(&self) -> ClassifierOptions {
        ClassifierOptions {
            batch_size: self.batch_size,
            batch_threshold: self.batch_threshold,
            max_concurrency: self.max_concurrency,
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            excerpt_chars: self.excerpt_chars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: Option<String>,
    pub org_id: Option<String>,
    /// Upper bound for one call, transport retries included
    pub call_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub show_usage: bool,
    pub show_usage_details: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            org_id: None,
            call_timeout_secs: 180,
            request_timeout_secs: 60,
            max_retries: 3,
            initial_retry_delay_ms: 1_000,
            max_retry_delay_ms: 30_000,
            show_usage: true,
            show_usage_details: false,
        }
    }
}

impl LlmConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_interval: Duration::from_millis(self.initial_retry_delay_ms),
            max_interval: Duration::from_millis(self.max_retry_delay_ms),
            max_elapsed_time: Some(Duration::from_secs(self.call_timeout_secs)),
            ..RetryConfig::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}', expected text or json", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl PipelineConfig {
    /// Defaults, overlaid with `path` when given, then with `env` overrides, then validated
    pub fn load(path: Option<&Path>, env: &dyn ConfigProvider) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Apply `{section}_{field}` overrides from a provider
    pub fn apply_overrides(&mut self, env: &dyn ConfigProvider) -> Result<(), ConfigError> {
        set_path(env, "paths_data_dir", &mut self.paths.data_dir);
        set_path(env, "paths_output_dir", &mut self.paths.output_dir);
        set_path(env, "paths_agents_dir", &mut self.paths.agents_dir);

        set_parsed(env, "collection_base_url", &mut self.collection.base_url)?;
        set_parsed(env, "collection_page_ceiling", &mut self.collection.page_ceiling)?;
        set_parsed(env, "collection_request_delay_ms", &mut self.collection.request_delay_ms)?;
        set_parsed(env, "collection_attempts_per_strategy", &mut self.collection.attempts_per_strategy)?;
        set_parsed(env, "collection_http_timeout_secs", &mut self.collection.http_timeout_secs)?;
        set_parsed(env, "collection_browser_timeout_secs", &mut self.collection.browser_timeout_secs)?;
        if let Some(binary) = env.lookup("collection_browser_binary") {
            self.collection.browser_binary = Some(PathBuf::from(binary));
        }
        if let Some(user_agent) = env.lookup("collection_user_agent") {
            self.collection.user_agent = Some(user_agent);
        }

        set_parsed(env, "discovery_sample_size", &mut self.discovery.sample_size)?;
        set_parsed(env, "discovery_min_categories", &mut self.discovery.min_categories)?;
        set_parsed(env, "discovery_max_categories", &mut self.discovery.max_categories)?;
        if let Some(seed) = parsed::<u64>(env, "discovery_seed")? {
            self.discovery.seed = Some(seed);
        }

        set_parsed(env, "classification_batch_size", &mut self.classification.batch_size)?;
        set_parsed(env, "classification_batch_threshold", &mut self.classification.batch_threshold)?;
        set_parsed(env, "classification_max_concurrency", &mut self.classification.max_concurrency)?;
        set_parsed(env, "classification_max_attempts", &mut self.classification.max_attempts)?;
        set_parsed(env, "classification_initial_backoff_ms", &mut self.classification.initial_backoff_ms)?;
        set_parsed(env, "classification_backoff_multiplier", &mut self.classification.backoff_multiplier)?;
        set_parsed(env, "classification_max_backoff_ms", &mut self.classification.max_backoff_ms)?;
        set_parsed(env, "classification_excerpt_chars", &mut self.classification.excerpt_chars)?;

        set_parsed(env, "llm_model", &mut self.llm.model)?;
        if let Some(base_url) = env.lookup("llm_base_url") {
            self.llm.base_url = Some(base_url);
        }
        if let Some(org_id) = env.lookup("llm_org_id") {
            self.llm.org_id = Some(org_id);
        }
        set_parsed(env, "llm_call_timeout_secs", &mut self.llm.call_timeout_secs)?;
        set_parsed(env, "llm_request_timeout_secs", &mut self.llm.request_timeout_secs)?;
        set_parsed(env, "llm_max_retries", &mut self.llm.max_retries)?;
        set_parsed(env, "llm_initial_retry_delay_ms", &mut self.llm.initial_retry_delay_ms)?;
        set_parsed(env, "llm_max_retry_delay_ms", &mut self.llm.max_retry_delay_ms)?;
        if let Some(show) = env.get_bool("llm_show_usage").map_err(invalid)? {
            self.llm.show_usage = show;
        }
        if let Some(details) = env.get_bool("llm_show_usage_details").map_err(invalid)? {
            self.llm.show_usage_details = details;
        }

        set_parsed(env, "logging_level", &mut self.logging.level)?;
        if let Some(format) = env.lookup("logging_format") {
            self.logging.format = format.parse().map_err(ConfigError::InvalidValue)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.collection.base_url.trim().is_empty() {
            problems.push("collection.base_url must not be empty".to_string());
        }
        if self.collection.page_ceiling == 0 {
            problems.push("collection.page_ceiling must be at least 1".to_string());
        }
        if self.collection.attempts_per_strategy == 0 {
            problems.push("collection.attempts_per_strategy must be at least 1".to_string());
        }
        if self.discovery.sample_size == 0 {
            problems.push("discovery.sample_size must be at least 1".to_string());
        }
        if self.discovery.min_categories > self.discovery.max_categories {
            problems.push(format!(
                "discovery.min_categories ({}) exceeds discovery.max_categories ({})",
                self.discovery.min_categories, self.discovery.max_categories
            ));
        }
        if self.classification.batch_size == 0 {
            problems.push("classification.batch_size must be at least 1".to_string());
        }
        if self.classification.max_concurrency == 0 {
            problems.push("classification.max_concurrency must be at least 1".to_string());
        }
        if self.classification.max_attempts == 0 {
            problems.push("classification.max_attempts must be at least 1".to_string());
        }
        if !(1.0..).contains(&self.classification.backoff_multiplier) {
            problems.push(format!(
                "classification.backoff_multiplier ({}) must be at least 1.0",
                self.classification.backoff_multiplier
            ));
        }
        if self.llm.model.trim().is_empty() {
            problems.push("llm.model must not be empty".to_string());
        }
        if self.llm.call_timeout_secs == 0 {
            problems.push("llm.call_timeout_secs must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue(problems.join("; ")))
        }
    }
}

/// The API key, if the provider has one. Its absence only matters to phases that call the model.
pub fn credential(provider: &dyn ConfigProvider) -> Option<String> {
    provider.lookup(CREDENTIAL_KEY).filter(|key| !key.trim().is_empty())
}

fn invalid(err: llm_sdk::ServiceError) -> ConfigError {
    ConfigError::InvalidValue(err.to_string())
}

fn parsed<T>(env: &dyn ConfigProvider, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    env.get_parsed(key).map_err(invalid)
}

fn set_parsed<T>(env: &dyn ConfigProvider, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    if let Some(value) = parsed(env, key)? {
        *slot = value;
    }
    Ok(())
}

fn set_path(env: &dyn ConfigProvider, key: &str, slot: &mut PathBuf) {
    if let Some(value) = env.lookup(key) {
        *slot = PathBuf::from(value);
    }
}
