//! # Taxonomy
//!
//! The two model-backed phases of the pipeline:
//!
//! - [`TaxonomyProposer`] samples the collected complaints and asks the model
//!   for a small set of categories, returned as a proposal awaiting curation
//! - [`Classifier`] assigns every complaint exactly one category from the
//!   curated taxonomy, retrying failed calls and recording failed items
//!
//! Both reach the model through a [`ClassificationGateway`], which renders
//! the named prompt profile, bounds each call with a timeout and meters
//! token usage.

pub mod classifier;
pub mod gateway;
pub mod proposer;
pub mod response;

pub use classifier::{Classifier, ClassifierOptions, CANCELLED_REASON};
pub use gateway::{ClassificationGateway, GatewayError};
pub use proposer::{format_sample, sample_complaints, ProposerOptions, TaxonomyProposer};
pub use response::{parse_batch, parse_proposal, parse_single, strip_code_fences, BatchAssignment, ResponseError};
