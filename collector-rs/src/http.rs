//! Plain HTTP fetching: fast, but the first thing anti-bot defences stop

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};

use crate::fetch::{require_payload, FetchFailure, FetchStrategy, PageRequest, StrategyKind};

/// Fetches listing pages with a browser-like HTTP client
#[derive(Debug, Clone)]
pub struct HttpFetchStrategy {
    client: Client,
    timeout: Duration,
}

impl HttpFetchStrategy {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchFailure> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("pt-BR,pt;q=0.9,en;q=0.8"),
        );

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchFailure::Transport(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    fn classify_status(status: StatusCode) -> FetchFailure {
        match status {
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                FetchFailure::Blocked(format!("status {}", status.as_u16()))
            }
            other => FetchFailure::Http(other.as_u16()),
        }
    }

    fn classify_error(&self, err: reqwest::Error) -> FetchFailure {
        if err.is_timeout() {
            FetchFailure::Timeout(self.timeout)
        } else {
            FetchFailure::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl FetchStrategy for HttpFetchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Http
    }

    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchFailure> {
        let response = self
            .client
            .get(&request.url)
            .send()
            .await
            .map_err(|e| self.classify_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_status(status));
        }

        let body = response.text().await.map_err(|e| self.classify_error(e))?;
        require_payload(body)
    }
}
