//! Error mapping for upstream HTTP APIs
//!
//! Converts error responses into the normalized ServiceError type.

use reqwest::StatusCode;
use serde_json::Value;

use super::{ErrorContext, ServiceError};

fn by_status(status: StatusCode, message: String) -> ServiceError {
    match status {
        StatusCode::UNAUTHORIZED => ServiceError::authentication(message),
        StatusCode::FORBIDDEN => ServiceError::authorization(message),
        StatusCode::TOO_MANY_REQUESTS => ServiceError::rate_limit(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ServiceError::timeout(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ServiceError::validation(message),
        _ => ServiceError::service(message),
    }
}

/// Map an OpenAI API error body to a ServiceError
pub fn map_openai_error(status: StatusCode, json: &Value, context: &mut ErrorContext) -> ServiceError {
    context.service = "openai".to_string();

    let error = json.get("error").unwrap_or(json);

    if let Some(error_type) = error.get("type").and_then(|t| t.as_str()) {
        context.add("error_type", error_type);
    }

    if let Some(code) = error.get("code").and_then(|c| c.as_str()) {
        context.error_code = Some(code.to_string());
    }

    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown OpenAI error")
        .to_string();

    by_status(status, message)
}

/// Map a generic HTTP error to a ServiceError
pub fn map_http_error(status: StatusCode, body: &str, context: &mut ErrorContext) -> ServiceError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if context.service == "openai" {
            return map_openai_error(status, &json, context);
        }

        let message = json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(|m| m.as_str())
            .unwrap_or(body)
            .to_string();
        return by_status(status, message);
    }

    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, crate::util::truncate_chars(body, 100))
    };

    by_status(status, message)
}

/// Determine if an HTTP status code indicates a retryable error
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}
