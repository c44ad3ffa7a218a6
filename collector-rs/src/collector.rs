//! Paged collection: fetch, parse, assign ids, redact

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use complaint_types::{CancellationFlag, Complaint, ComplaintStatus, PartialCollection};
use redaction::{redact_with_report, PiiCategory};

use crate::browser::BrowserFetchStrategy;
use crate::fetch::{FetchAttempt, FetchFailure, FetchStrategy, PageRequest};
use crate::http::HttpFetchStrategy;
use crate::parser::{self, Listing};
use crate::selector::FetchStrategySelector;

/// Browser-like UA sent by both strategies unless configured otherwise
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Settings for one collection run
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    /// Company page on the source site, e.g. `https://site/empresa/acme`
    pub base_url: String,
    /// Highest page number fetched
    pub page_ceiling: u32,
    pub delay: Duration,
    pub attempts_per_strategy: u32,
    pub http_timeout: Duration,
    pub browser_timeout: Duration,
    pub browser_binary: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            page_ceiling: 20,
            delay: Duration::from_secs(2),
            attempts_per_strategy: 1,
            http_timeout: Duration::from_secs(30),
            browser_timeout: Duration::from_secs(60),
            browser_binary: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Why a page contributed nothing
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Fetch(FetchFailure),
    Parse(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Fetch(failure) => write!(f, "fetch failed: {}", failure),
            SkipReason::Parse(reason) => write!(f, "unparseable page: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPage {
    pub page: u32,
    pub reason: SkipReason,
}

/// Everything a collection run produced
#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    pub complaints: Vec<Complaint>,
    /// Pages that were fetched and parsed
    pub pages_fetched: u32,
    /// Highest page number reached, skipped pages included
    pub last_page: u32,
    pub skipped_pages: Vec<SkippedPage>,
    pub attempts: Vec<FetchAttempt>,
    /// Pages on which the secondary strategy was used
    pub fallback_pages: u32,
    pub duplicates_dropped: u32,
    pub redactions: BTreeMap<PiiCategory, usize>,
    pub cancelled: bool,
    /// The source ran out of listings before the ceiling
    pub reached_end: bool,
}

impl CollectionReport {
    pub fn complete(&self) -> bool {
        !self.cancelled
    }

    /// Marked partial payload for an interrupted run
    pub fn to_partial(&self) -> PartialCollection {
        PartialCollection::new(self.last_page, self.complaints.clone())
    }
}

/// Produces the ordered, redacted complaint sequence for one company
pub struct Collector {
    selector: FetchStrategySelector,
    options: CollectionOptions,
}

impl Collector {
    /// HTTP first, headless browser as the fallback
    pub fn new(options: CollectionOptions) -> Result<Self, FetchFailure> {
        let http = HttpFetchStrategy::new(&options.user_agent, options.http_timeout)?;
        let browser = BrowserFetchStrategy::new(
            options.browser_binary.clone(),
            options.user_agent.clone(),
            options.browser_timeout,
        );
        let selector = FetchStrategySelector::new(Arc::new(http), Some(Arc::new(browser)));
        Ok(Self::with_selector(selector, options))
    }

    /// Use a prepared selector. Pacing and attempt counts come from `options`.
    pub fn with_selector(selector: FetchStrategySelector, options: CollectionOptions) -> Self {
        let selector = selector
            .with_delay(options.delay)
            .with_attempts_per_strategy(options.attempts_per_strategy);
        Self { selector, options }
    }

    /// Convenience for tests and tools: explicit strategies, no pacing
    pub fn from_strategies(
        primary: Arc<dyn FetchStrategy>,
        secondary: Option<Arc<dyn FetchStrategy>>,
        options: CollectionOptions,
    ) -> Self {
        Self::with_selector(FetchStrategySelector::new(primary, secondary), options)
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.options
    }

    pub async fn collect(&self, cancel: &CancellationFlag) -> CollectionReport {
        let mut report = CollectionReport::default();
        let mut seen: HashSet<String> = HashSet::new();

        tracing::info!(
            base_url = %self.options.base_url,
            ceiling = self.options.page_ceiling,
            "starting collection"
        );

        for page in 1..=self.options.page_ceiling {
            if cancel.is_cancelled() {
                tracing::warn!(page, "collection cancelled");
                report.cancelled = true;
                break;
            }

            let request = PageRequest {
                page,
                url: parser::page_url(&self.options.base_url, page),
            };
            let outcome = self.selector.fetch(&request).await;
            report.last_page = page;
            report.attempts.extend(outcome.attempts);
            if outcome.used_fallback {
                report.fallback_pages += 1;
            }

            let body = match outcome.result {
                Ok(body) => body,
                Err(failure) => {
                    tracing::error!(page, error = %failure, "page skipped after all strategies failed");
                    report.skipped_pages.push(SkippedPage {
                        page,
                        reason: SkipReason::Fetch(failure),
                    });
                    continue;
                }
            };

            let listings = match parser::parse_listings(&body) {
                Ok(listings) => listings,
                Err(err) => {
                    tracing::error!(page, error = %err, "page skipped: payload not parseable");
                    report.skipped_pages.push(SkippedPage {
                        page,
                        reason: SkipReason::Parse(err.to_string()),
                    });
                    continue;
                }
            };

            report.pages_fetched += 1;
            if listings.is_empty() {
                tracing::info!(page, "no listings on page, source exhausted");
                report.reached_end = true;
                break;
            }

            let before = report.complaints.len();
            for (index, listing) in listings.iter().enumerate() {
                let complaint_id = complaint_id(listing, page, index + 1);
                if !seen.insert(complaint_id.clone()) {
                    tracing::warn!(page, %complaint_id, "duplicate listing dropped");
                    report.duplicates_dropped += 1;
                    continue;
                }

                let sequence = report.complaints.len() as u64 + 1;
                let complaint = self.build_complaint(listing, complaint_id, sequence, &mut report.redactions);
                report.complaints.push(complaint);
            }

            tracing::info!(
                page,
                added = report.complaints.len() - before,
                total = report.complaints.len(),
                "page collected"
            );
        }

        tracing::info!(
            complaints = report.complaints.len(),
            pages = report.pages_fetched,
            skipped = report.skipped_pages.len(),
            fallback_pages = report.fallback_pages,
            cancelled = report.cancelled,
            "collection finished"
        );
        report
    }

    fn build_complaint(
        &self,
        listing: &Listing,
        complaint_id: String,
        sequence: u64,
        redactions: &mut BTreeMap<PiiCategory, usize>,
    ) -> Complaint {
        let mut clean = |raw: &str| {
            let redaction = redact_with_report(parser::strip_markup(raw).trim());
            for (category, count) in redaction.counts {
                *redactions.entry(category).or_default() += count;
            }
            redaction.text
        };

        let title = clean(&listing.title);
        let body = clean(&listing.description);
        let final_consideration = listing
            .final_consideration
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(&mut clean);

        Complaint {
            complaint_id,
            sequence,
            title,
            body,
            opened_at: parser::parse_opened_at(&listing.created),
            status: ComplaintStatus::from_listing(&listing.status, listing.solved),
            public_link: parser::public_link(&self.options.base_url, &listing.url),
            final_consideration,
        }
    }
}

/// Stable id for a listing; positional only when the source gives none
fn complaint_id(listing: &Listing, page: u32, item: usize) -> String {
    match listing.source_id() {
        Some(id) => format!("COMPLAINT_{}", id),
        None => format!("PAGE{}_ITEM{}", page, item),
    }
}
