//! Errors from model calls.
//!
//! `ServiceError` says what kind of failure happened; `WithContext` layers
//! carry the HTTP status, request id and profile so a failed phase can name
//! the call that broke. `is_retryable` drives the transport retry loop and
//! `is_configuration` marks failures no retry can fix.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub mod mapping;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// The API could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// 401: missing or rejected API key
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// 403: the key may not use this model
    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Any other non-success status from the API
    #[error("Service error: {0}")]
    Service(String),

    /// 400/422: the API refused the prompt or parameters
    #[error("Validation error: {0}")]
    Validation(String),

    /// The reply body could not be read
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Bad profile, template or credential. Retrying will not help.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Too many consecutive failures; calls are short-circuited until the reset window passes
    #[error("Circuit broken: {0}")]
    CircuitBroken(String),

    #[error("{inner}")]
    WithContext {
        inner: Box<ServiceError>,
        context: ErrorContext,
    },
}

impl ServiceError {
    pub fn network(message: impl Into<String>) -> Self {
        ServiceError::Network(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        ServiceError::Authentication(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        ServiceError::Authorization(message.into())
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        ServiceError::RateLimit(message.into())
    }

    pub fn service(message: impl Into<String>) -> Self {
        ServiceError::Service(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn parsing(message: impl Into<String>) -> Self {
        ServiceError::Parsing(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        ServiceError::Timeout(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::Internal(message.into())
    }

    pub fn circuit_broken(message: impl Into<String>) -> Self {
        ServiceError::CircuitBroken(message.into())
    }

    pub fn with_context(self, context: ErrorContext) -> Self {
        ServiceError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// Tag the error with one detail, such as the profile name or retry count
    pub fn with_context_value(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let mut context = ErrorContext::default();
        context.add(key, value);
        self.with_context(context)
    }

    /// The innermost error, with all context layers removed
    pub fn root(&self) -> &ServiceError {
        match self {
            ServiceError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Outermost status code recorded on any context layer
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ServiceError::WithContext { context, inner } => context.status_code.or_else(|| inner.status_code()),
            _ => None,
        }
    }

    /// Worth another attempt: transport trouble, throttling, an open breaker, or a 5xx/408/429 status
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Network(_)
            | ServiceError::Timeout(_)
            | ServiceError::RateLimit(_)
            | ServiceError::CircuitBroken(_) => true,
            ServiceError::WithContext { inner, context } => {
                inner.is_retryable() || context.status_code.is_some_and(mapping::is_retryable_status)
            }
            _ => false,
        }
    }

    /// Configuration problems will fail the same way on every attempt
    pub fn is_configuration(&self) -> bool {
        matches!(self.root(), ServiceError::Configuration(_))
    }
}

/// Where a failed model call went and what the API said about it
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub service: String,
    pub status_code: Option<u16>,
    /// API error code, e.g. `rate_limit_exceeded`
    pub error_code: Option<String>,
    pub request_id: Option<String>,
    pub endpoint: Option<String>,
    /// Free-form details such as the profile name or retry count
    pub data: HashMap<String, String>,
}

impl ErrorContext {
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.data.insert(key.into(), value.to_string());
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        let context = ErrorContext::for_service("http_client");

        let service_error = if err.is_timeout() {
            ServiceError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ServiceError::network(format!("Connection error: {}", err))
        } else if err.is_request() {
            ServiceError::network(format!("Request failed: {}", err))
        } else if err.is_redirect() {
            ServiceError::network(format!("Too many redirects: {}", err))
        } else if err.is_decode() {
            ServiceError::parsing(format!("Response decode error: {}", err))
        } else {
            ServiceError::internal(format!("HTTP client error: {}", err))
        };

        if let Some(status) = err.status() {
            service_error.with_context(context.status_code(status.as_u16()))
        } else {
            service_error.with_context(context)
        }
    }
}

/// A reply that is not the JSON we asked for
impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::parsing(format!("JSON error: {}", err))
            .with_context(ErrorContext::for_service("json"))
    }
}
