// taxonomy-rs/src/gateway.rs
//
// The single door through which the proposer and the classifier reach the
// language model: profile lookup, template rendering, a per-call timeout and
// usage metering. Everything below the backend seam is the llm-sdk's job.

use std::sync::Arc;
use std::time::{Duration, Instant};

use llm_sdk::{CompletionBackend, ProfileRegistry, ServiceError, TemplateValues, UsageLog};
use thiserror::Error;

/// Failure of one gateway call
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport, provider or timeout failure; callers may retry
    #[error("external call failed: {0}")]
    External(#[source] ServiceError),

    /// The response arrived but broke its expected shape
    #[error("response violated its contract: {0}")]
    Postcondition(String),

    /// Unknown profile or unresolved template placeholder; retrying cannot help
    #[error("profile configuration error: {0}")]
    Configuration(#[source] ServiceError),
}

impl GatewayError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, GatewayError::Configuration(_))
    }
}

impl From<ServiceError> for GatewayError {
    fn from(err: ServiceError) -> Self {
        if err.is_configuration() {
            GatewayError::Configuration(err)
        } else {
            GatewayError::External(err)
        }
    }
}

/// Renders profiles, calls the backend under a timeout and meters usage
#[derive(Clone)]
pub struct ClassificationGateway {
    backend: Arc<dyn CompletionBackend>,
    profiles: Arc<ProfileRegistry>,
    default_model: String,
    call_timeout: Duration,
    usage: Option<Arc<UsageLog>>,
}

impl ClassificationGateway {
    pub fn new(backend: Arc<dyn CompletionBackend>, default_model: impl Into<String>) -> Self {
        Self {
            backend,
            profiles: Arc::new(ProfileRegistry::builtin()),
            default_model: default_model.into(),
            call_timeout: Duration::from_secs(120),
            usage: None,
        }
    }

    pub fn with_profiles(mut self, profiles: ProfileRegistry) -> Self {
        self.profiles = Arc::new(profiles);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_usage_log(mut self, usage: Arc<UsageLog>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn usage_log(&self) -> Option<&Arc<UsageLog>> {
        self.usage.as_ref()
    }

    /// Check that a profile renders with `values` without calling the backend
    pub fn check_profile(&self, profile: &str, values: &TemplateValues) -> Result<(), GatewayError> {
        let profile = self.profiles.get(profile).map_err(GatewayError::Configuration)?;
        profile
            .render(&self.default_model, values)
            .map(|_| ())
            .map_err(GatewayError::Configuration)
    }

    /// Render `profile` with `values`, call the backend and return the raw text
    pub async fn call(&self, profile: &str, values: &TemplateValues) -> Result<String, GatewayError> {
        let agent = self.profiles.get(profile).map_err(GatewayError::Configuration)?;
        let request = agent
            .render(&self.default_model, values)
            .map_err(GatewayError::Configuration)?;
        let model = request.model.clone();

        let started = Instant::now();
        let completion = tokio::time::timeout(self.call_timeout, self.backend.complete(request))
            .await
            .map_err(|_| {
                GatewayError::External(ServiceError::timeout(format!(
                    "{} call did not finish within {:?}",
                    profile, self.call_timeout
                )))
            })??;
        let elapsed = started.elapsed();

        tracing::debug!(
            profile,
            backend = self.backend.name(),
            model = %completion.model,
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            elapsed_ms = elapsed.as_millis() as u64,
            "completion received"
        );

        if let Some(usage) = &self.usage {
            let model = if completion.model.is_empty() { &model } else { &completion.model };
            // Metering must never fail the call it meters
            if let Err(err) = usage
                .record(profile, model, completion.input_tokens, completion.output_tokens, elapsed)
                .await
            {
                tracing::warn!(error = %err, "could not append usage record");
            }
        }

        Ok(completion.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm_sdk::{Completion, CompletionRequest};

    struct Slow;

    #[async_trait]
    impl CompletionBackend for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, request: CompletionRequest) -> llm_sdk::Result<Completion> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Completion {
                text: "A".into(),
                model: request.model,
                input_tokens: 1,
                output_tokens: 1,
            })
        }
    }

    fn classifier_values() -> TemplateValues {
        TemplateValues::new()
            .set("taxonomy_text", "- A: a")
            .set("complaint_text", "Title: t\nText: b")
    }

    #[tokio::test]
    async fn slow_backend_times_out_as_external_failure() {
        let gateway = ClassificationGateway::new(Arc::new(Slow), "gpt-4o-mini")
            .with_call_timeout(Duration::from_millis(20));

        let err = gateway
            .call(llm_sdk::profile::COMPLAINT_CLASSIFIER, &classifier_values())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::External(ServiceError::Timeout(_))));
    }

    #[tokio::test]
    async fn missing_placeholder_is_configuration_error() {
        let gateway = ClassificationGateway::new(Arc::new(Slow), "gpt-4o-mini");
        let values = TemplateValues::new().set("taxonomy_text", "- A: a");

        let err = gateway
            .call(llm_sdk::profile::COMPLAINT_CLASSIFIER, &values)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(gateway.check_profile("no_such_profile", &values).unwrap_err().is_configuration());
    }
}
