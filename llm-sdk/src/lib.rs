//! # LLM SDK
//!
//! Client plumbing for the language-model calls made by the complaint
//! pipeline.
//!
//! This crate provides:
//!
//! - `CompletionBackend`: the seam every model call goes through
//! - `OpenAIClient`: an OpenAI-compatible chat completions backend
//! - `ServiceError`: categorized errors with HTTP context and retryability
//! - `Resilience`: retry with exponential backoff plus a circuit breaker
//! - `ConfigProvider`: key/value configuration sources (env, memory)
//! - `ProfileRegistry`: named prompt profiles with `{placeholder}` templates
//! - `UsageLog`: JSON Lines token and cost accounting

pub mod core;
pub use core::{Completion, CompletionBackend, CompletionRequest};

pub mod services;
pub use services::openai;
pub use services::openai::{OpenAIClient, OpenAIClientBuilder};

pub mod error;
pub use error::{ErrorContext, Result, ServiceError};

pub mod resilience;
pub use resilience::{CircuitBreakerConfig, Resilience, RetryConfig};

pub mod config;
pub use config::{
    ConfigProvider, ConfigProviderExt, EnvConfigProvider, MemoryConfigProvider, OpenAIConfig, ServiceConfig,
};

pub mod profile;
pub use profile::{render_template, AgentProfile, ProfileRegistry, TemplateValues};

pub mod usage;
pub use usage::{PricingTable, UsageLog, UsageRecord, UsageSummary, UsageTotals, DEFAULT_PRICING};

mod util;
pub use util::{measure_time_async, truncate_chars};

#[cfg(test)]
mod tests;
