//! # Collector
//!
//! Paged collection of public complaints for one company.
//!
//! Each listing page is fetched through a [`FetchStrategySelector`]: plain
//! HTTP first, a headless browser when HTTP is blocked or fails. The embedded
//! `__NEXT_DATA__` payload is parsed into listings, each listing gets a
//! stable `complaint_id`, and title, body and final consideration are
//! redacted before the record leaves this crate.
//!
//! A page that fails on every strategy is recorded in the
//! [`CollectionReport`] and skipped; it never aborts the run.

mod browser;
mod collector;
mod fetch;
mod http;
mod parser;
mod selector;

pub use browser::BrowserFetchStrategy;
pub use collector::{
    CollectionOptions, CollectionReport, Collector, SkipReason, SkippedPage, DEFAULT_USER_AGENT,
};
pub use fetch::{FetchAttempt, FetchFailure, FetchStrategy, PageRequest, StrategyKind, LISTING_PAYLOAD_MARKER};
pub use http::HttpFetchStrategy;
pub use parser::{page_url, parse_listings, strip_markup, Listing, ParseError};
pub use selector::{FetchOutcome, FetchStrategySelector};
