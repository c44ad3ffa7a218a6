//! Primary-then-secondary fetching with pacing between attempts

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::fetch::{FetchAttempt, FetchFailure, FetchStrategy, PageRequest};

/// Result of fetching one page through the selector
#[derive(Debug)]
pub struct FetchOutcome {
    pub result: Result<String, FetchFailure>,
    pub attempts: Vec<FetchAttempt>,
    /// True when the secondary strategy was tried
    pub used_fallback: bool,
}

/// Tries the primary strategy, then the secondary one, returning one result
pub struct FetchStrategySelector {
    primary: Arc<dyn FetchStrategy>,
    secondary: Option<Arc<dyn FetchStrategy>>,
    attempts_per_strategy: u32,
    delay: Duration,
    last_attempt: Mutex<Option<Instant>>,
}

impl FetchStrategySelector {
    pub fn new(primary: Arc<dyn FetchStrategy>, secondary: Option<Arc<dyn FetchStrategy>>) -> Self {
        Self {
            primary,
            secondary,
            attempts_per_strategy: 1,
            delay: Duration::ZERO,
            last_attempt: Mutex::new(None),
        }
    }

    /// Minimum gap between the end of one attempt and the start of the next
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_attempts_per_strategy(mut self, attempts: u32) -> Self {
        self.attempts_per_strategy = attempts.max(1);
        self
    }

    pub async fn fetch(&self, request: &PageRequest) -> FetchOutcome {
        let mut attempts = Vec::new();
        let mut used_fallback = false;
        let mut last_failure = FetchFailure::Empty;

        let strategies = std::iter::once(&self.primary).chain(self.secondary.iter());
        for (index, strategy) in strategies.enumerate() {
            if index > 0 {
                used_fallback = true;
                tracing::info!(
                    page = request.page,
                    strategy = %strategy.kind(),
                    "primary strategy failed, falling back"
                );
            }

            for _ in 0..self.attempts_per_strategy {
                self.pace().await;
                let started = Instant::now();
                let result = strategy.fetch(request).await;
                self.mark().await;

                let elapsed = started.elapsed();
                attempts.push(FetchAttempt {
                    page: request.page,
                    strategy: strategy.kind(),
                    outcome: result.as_ref().map(|_| ()).map_err(|e| e.clone()),
                    elapsed,
                });

                match result {
                    Ok(body) => {
                        tracing::debug!(page = request.page, strategy = %strategy.kind(), ?elapsed, "page fetched");
                        return FetchOutcome {
                            result: Ok(body),
                            attempts,
                            used_fallback,
                        };
                    }
                    Err(failure) => {
                        tracing::warn!(
                            page = request.page,
                            strategy = %strategy.kind(),
                            error = %failure,
                            "fetch attempt failed"
                        );
                        last_failure = failure;
                    }
                }
            }
        }

        FetchOutcome {
            result: Err(last_failure),
            attempts,
            used_fallback,
        }
    }

    async fn pace(&self) {
        if self.delay.is_zero() {
            return;
        }
        let last = *self.last_attempt.lock().await;
        if let Some(last) = last {
            let since = last.elapsed();
            if since < self.delay {
                tokio::time::sleep(self.delay - since).await;
            }
        }
    }

    async fn mark(&self) {
        *self.last_attempt.lock().await = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{MockFetchStrategy, StrategyKind};
    use mockall::predicate;

    fn request(page: u32) -> PageRequest {
        PageRequest {
            page,
            url: format!("https://example.test/lista-reclamacoes/?pagina={}", page),
        }
    }

    fn mock(kind: StrategyKind) -> MockFetchStrategy {
        let mut strategy = MockFetchStrategy::new();
        strategy.expect_kind().return_const(kind);
        strategy
    }

    #[tokio::test]
    async fn primary_success_skips_secondary() {
        let mut primary = mock(StrategyKind::Http);
        primary
            .expect_fetch()
            .with(predicate::eq(request(1)))
            .times(1)
            .returning(|_| Ok("__NEXT_DATA__ page".to_string()));
        let mut secondary = mock(StrategyKind::Browser);
        secondary.expect_fetch().never();

        let selector = FetchStrategySelector::new(Arc::new(primary), Some(Arc::new(secondary)));
        let outcome = selector.fetch(&request(1)).await;

        assert!(outcome.result.is_ok());
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.attempts.len(), 1);
    }

    #[tokio::test]
    async fn blocked_primary_falls_back_once() {
        let mut primary = mock(StrategyKind::Http);
        primary
            .expect_fetch()
            .times(1)
            .returning(|_| Err(FetchFailure::Blocked("status 403".to_string())));
        let mut secondary = mock(StrategyKind::Browser);
        secondary
            .expect_fetch()
            .times(1)
            .returning(|_| Ok("__NEXT_DATA__ rendered".to_string()));

        let selector = FetchStrategySelector::new(Arc::new(primary), Some(Arc::new(secondary)));
        let outcome = selector.fetch(&request(3)).await;

        assert_eq!(outcome.result.unwrap(), "__NEXT_DATA__ rendered");
        assert!(outcome.used_fallback);
        let kinds: Vec<_> = outcome.attempts.iter().map(|a| a.strategy).collect();
        assert_eq!(kinds, vec![StrategyKind::Http, StrategyKind::Browser]);
        assert!(!outcome.attempts[0].succeeded());
    }

    #[tokio::test]
    async fn both_failing_returns_last_failure() {
        let mut primary = mock(StrategyKind::Http);
        primary.expect_fetch().returning(|_| Err(FetchFailure::Http(500)));
        let mut secondary = mock(StrategyKind::Browser);
        secondary
            .expect_fetch()
            .returning(|_| Err(FetchFailure::ToolUnavailable("no chromium".to_string())));

        let selector = FetchStrategySelector::new(Arc::new(primary), Some(Arc::new(secondary)))
            .with_attempts_per_strategy(2);
        let outcome = selector.fetch(&request(1)).await;

        assert_eq!(
            outcome.result,
            Err(FetchFailure::ToolUnavailable("no chromium".to_string()))
        );
        assert_eq!(outcome.attempts.len(), 4);
    }

    #[tokio::test]
    async fn delay_separates_consecutive_attempts() {
        let mut primary = mock(StrategyKind::Http);
        primary.expect_fetch().returning(|_| Err(FetchFailure::Http(502)));
        let mut secondary = mock(StrategyKind::Browser);
        secondary.expect_fetch().returning(|_| Ok("__NEXT_DATA__".to_string()));

        let selector = FetchStrategySelector::new(Arc::new(primary), Some(Arc::new(secondary)))
            .with_delay(Duration::from_millis(60));

        let started = Instant::now();
        selector.fetch(&request(1)).await;
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
