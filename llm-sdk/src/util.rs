//! Small helpers shared by the client and the usage log

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;

static SECRET_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"Bearer [A-Za-z0-9\-_\.]+", "Bearer [REDACTED]"),
        (r"sk-[A-Za-z0-9\-_]{8,}", "sk-[REDACTED]"),
        (r"(?i)api[_-]?key[=:]\s*[A-Za-z0-9\-_]+", "api_key=[REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Run a future and report how long it took
pub async fn measure_time_async<F, T, Fut>(f: F) -> (T, Duration)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = f().await;
    (result, start.elapsed())
}

/// Truncate to at most `max_chars` characters, adding an ellipsis if cut
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Mask credentials that upstream services sometimes echo back in errors
pub fn sanitize_for_logging(s: &str) -> String {
    let mut result = s.to_string();
    for (re, replacement) in SECRET_PATTERNS.iter() {
        result = re.replace_all(&result, *replacement).to_string();
    }
    result
}

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
