//! Configuration providers and client configuration
//!
//! Providers are a thin key/value abstraction so that callers can layer
//! environment overrides on top of file-based settings without the client
//! reading the environment itself.

use std::collections::HashMap;
use std::env;
use std::fmt::{Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Look up a raw value; `None` when the key is not set
    fn lookup(&self, key: &str) -> Option<String>;

    /// Human-readable name of the key, used in error messages
    fn describe_key(&self, key: &str) -> String {
        key.to_string()
    }

    /// Get a required string configuration value
    fn get_string(&self, key: &str) -> Result<String> {
        self.lookup(key).ok_or_else(|| {
            ServiceError::configuration(format!("Configuration key not set: {}", self.describe_key(key)))
        })
    }
}

/// Typed accessors for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Parse a value if present. Missing keys are `Ok(None)`; malformed ones are errors.
    fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.lookup(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                ServiceError::configuration(format!(
                    "Invalid value for {}: {} ({})",
                    self.describe_key(key),
                    raw,
                    e
                ))
            }),
        }
    }

    /// Get a boolean configuration value if present
    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.lookup(key) {
            None => Ok(None),
            Some(value) => match value.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Some(true)),
                "false" | "no" | "0" | "off" => Ok(Some(false)),
                _ => Err(ServiceError::configuration(format!(
                    "Invalid boolean for {}: {}",
                    self.describe_key(key),
                    value
                ))),
            },
        }
    }

    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.lookup(key).unwrap_or_else(|| default.to_string())
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    prefix: Option<String>,
    namespace: Option<String>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace (e.g. a config section) placed after the prefix
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable name
    pub fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        for part in [&self.prefix, &self.namespace].into_iter().flatten() {
            env_key.push_str(&part.to_uppercase());
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));
        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn lookup(&self, key: &str) -> Option<String> {
        match env::var(self.format_key(key)) {
            Ok(value) if !value.trim().is_empty() => Some(value),
            Ok(_) => None,
            Err(env::VarError::NotPresent) => None,
            Err(env::VarError::NotUnicode(_)) => {
                log::warn!("ignoring non-unicode environment variable {}", self.format_key(key));
                None
            }
        }
    }

    fn describe_key(&self, key: &str) -> String {
        self.format_key(key)
    }
}

/// In-memory config provider for tests or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Trait for service-specific configuration
pub trait ServiceConfig: Debug + Send + Sync {
    fn validate(&self) -> Result<()>;

    fn service_name(&self) -> &str;
}

/// Configuration for an OpenAI-compatible chat completions endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,

    #[serde(default)]
    pub org_id: Option<String>,

    /// Base URL, changeable for proxies and compatible providers
    pub base_url: String,

    pub timeout_seconds: u64,
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"[REDACTED]")
            .field("org_id", &self.org_id)
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            org_id: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout_seconds: 60,
        }
    }
}

impl OpenAIConfig {
    /// Load configuration from a provider (`openai_api_key`, `openai_org_id`, ...)
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let config = Self {
            api_key: provider.get_string("openai_api_key")?,
            org_id: provider.lookup("openai_org_id"),
            base_url: provider.get_string_or("openai_base_url", DEFAULT_OPENAI_BASE_URL),
            timeout_seconds: provider.get_parsed("openai_timeout_seconds")?.unwrap_or(60),
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for OpenAIConfig {
    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ServiceError::configuration("OpenAI API key is required"));
        }

        url::Url::parse(&self.base_url).map_err(|e| {
            ServiceError::configuration(format!("Invalid OpenAI base URL {}: {}", self.base_url, e))
        })?;

        if self.timeout_seconds == 0 {
            return Err(ServiceError::configuration("OpenAI timeout must be positive"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "openai"
    }
}
