//! Fetch strategy abstraction and the failure/attempt records it produces

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Marker that a listing page carries its embedded data payload
pub const LISTING_PAYLOAD_MARKER: &str = "__NEXT_DATA__";

/// One listing page to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub url: String,
}

/// Which strategy produced an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Http,
    Browser,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Http => f.write_str("http"),
            StrategyKind::Browser => f.write_str("browser"),
        }
    }
}

/// Terminal failure of one fetch attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// Anti-bot response: forbidden status or a challenge page without the payload
    #[error("blocked: {0}")]
    Blocked(String),

    #[error("unexpected HTTP status {0}")]
    Http(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The strategy's external tool (browser binary) could not be used
    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("empty response")]
    Empty,
}

/// Require the listing payload in a fetched document
pub(crate) fn require_payload(body: String) -> Result<String, FetchFailure> {
    if body.trim().is_empty() {
        return Err(FetchFailure::Empty);
    }
    if !body.contains(LISTING_PAYLOAD_MARKER) {
        return Err(FetchFailure::Blocked(
            "page has no listing payload (likely a challenge page)".to_string(),
        ));
    }
    Ok(body)
}

/// Record of a single attempt, kept for the collection report
#[derive(Debug, Clone, PartialEq)]
pub struct FetchAttempt {
    pub page: u32,
    pub strategy: StrategyKind,
    pub outcome: Result<(), FetchFailure>,
    pub elapsed: Duration,
}

impl FetchAttempt {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A way of turning a page reference into raw page content
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchFailure>;
}
