//! # Complaint Types
//!
//! Shared data model for the complaint classification pipeline.
//!
//! Every phase of the pipeline reads and writes the records defined here:
//!
//! - `Complaint`: one redacted customer complaint, created by the collector
//! - `ProposedTaxonomy` / `CuratedTaxonomy`: the category set before and after
//!   human curation
//! - `ClassificationArtifact`: per-complaint assignments plus the summary
//! - `PipelineError`: the error taxonomy surfaced to the orchestrator

pub mod cancel;
pub mod classification;
pub mod complaint;
pub mod error;
pub mod phase;
pub mod taxonomy;

pub use cancel::CancellationFlag;
pub use classification::{
    CategoryShare, ClassificationArtifact, ClassificationResult, ClassificationSummary, FailedItem,
};
pub use complaint::{Complaint, ComplaintStatus, PartialCollection};
pub use error::{ArtifactKind, PipelineError, Result};
pub use phase::Phase;
pub use taxonomy::{
    Category, CuratedTaxonomy, ProposedCategory, ProposedTaxonomy, TaxonomyError, TaxonomyStatus,
};
