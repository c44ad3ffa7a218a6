//! OpenAI chat completions client
//!
//! Works against any OpenAI-compatible endpoint; `base_url` can point at a
//! proxy or a local mock server.

mod models;
pub use models::*;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::{OpenAIConfig, ServiceConfig};
use crate::core::{Completion, CompletionBackend, CompletionRequest};
use crate::error::{ErrorContext, Result, ServiceError};
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerStatus, Resilience, RetryConfig};
use crate::services::common::{build_http_client, parse_error_response, UserAgent};
use crate::util::{generate_request_id, measure_time_async};

const SERVICE_NAME: &str = "openai";

/// OpenAI API client
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    http_client: Client,
    config: Arc<OpenAIConfig>,
    resilience: Resilience,
}

impl OpenAIClient {
    /// Create a client from a validated configuration
    pub fn new_with_config(config: OpenAIConfig) -> Result<Self> {
        OpenAIClientBuilder::from_config(config).build()
    }

    pub fn builder() -> OpenAIClientBuilder {
        OpenAIClientBuilder::default()
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    pub fn circuit_breaker_status(&self) -> CircuitBreakerStatus {
        self.resilience.circuit_breaker_status()
    }

    /// Send a chat completion request, retrying transient failures
    pub async fn chat_completion(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let request = &request;
        self.resilience
            .execute(|| self.execute_with_client("chat/completions", request))
            .await
    }

    async fn execute_with_client<T, R>(&self, endpoint: &str, request: &T) -> Result<R>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let request_id = generate_request_id();
        debug!("POST {} (request {})", url, request_id);

        let mut builder = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("X-Request-Id", &request_id)
            .json(request);

        if let Some(ref org) = self.config.org_id {
            builder = builder.header("OpenAI-Organization", org);
        }

        let (sent, elapsed) = measure_time_async(|| builder.send()).await;
        let response = sent.map_err(|e| {
            ServiceError::from(e).with_context(
                ErrorContext::for_service(SERVICE_NAME)
                    .endpoint(endpoint)
                    .request_id(request_id.clone()),
            )
        })?;

        let status = response.status();
        debug!("{} answered {} in {:?}", endpoint, status, elapsed);

        if !status.is_success() {
            return Err(parse_error_response(SERVICE_NAME, endpoint, response).await);
        }

        response.json::<R>().await.map_err(|e| {
            ServiceError::parsing(format!("Failed to parse {} response: {}", endpoint, e))
                .with_context(ErrorContext::for_service(SERVICE_NAME).request_id(request_id))
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAIClient {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let chat = ChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![ChatMessage::system(request.system), ChatMessage::user(request.user)],
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            user: None,
        };

        let response = self.chat_completion(chat).await?;
        let text = response
            .first_content()
            .ok_or_else(|| ServiceError::parsing("No completion content returned"))?
            .to_string();

        Ok(Completion {
            text,
            model: if response.model.is_empty() { request.model } else { response.model },
            input_tokens: response.usage.prompt_tokens,
            output_tokens: response.usage.completion_tokens,
        })
    }
}

/// Builder for OpenAI client
#[derive(Debug, Default)]
pub struct OpenAIClientBuilder {
    api_key: Option<String>,
    org_id: Option<String>,
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    retry_config: Option<RetryConfig>,
    circuit_breaker_config: Option<CircuitBreakerConfig>,
}

impl OpenAIClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the builder from an existing configuration
    pub fn from_config(config: OpenAIConfig) -> Self {
        Self {
            api_key: Some(config.api_key),
            org_id: config.org_id,
            base_url: Some(config.base_url),
            timeout_seconds: Some(config.timeout_seconds),
            ..Self::default()
        }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the per-request timeout in seconds
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker_config = Some(config);
        self
    }

    pub fn build(self) -> Result<OpenAIClient> {
        let defaults = OpenAIConfig::default();
        let config = OpenAIConfig {
            api_key: self.api_key.unwrap_or_default(),
            org_id: self.org_id,
            base_url: self.base_url.unwrap_or(defaults.base_url),
            timeout_seconds: self.timeout_seconds.unwrap_or(defaults.timeout_seconds),
        };
        config.validate()?;

        let http_client = build_http_client(
            Some(UserAgent {
                extra: Some("openai-client".to_string()),
                ..UserAgent::default()
            }),
            Some(Duration::from_secs(config.timeout_seconds)),
        )?;

        let resilience = Resilience::new(
            self.retry_config.unwrap_or_default(),
            self.circuit_breaker_config.unwrap_or_default(),
        );

        Ok(OpenAIClient {
            http_client,
            config: Arc::new(config),
            resilience,
        })
    }
}
