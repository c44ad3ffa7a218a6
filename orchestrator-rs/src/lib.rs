//! # Complaint Pipeline Orchestrator
//!
//! Sequences the four pipeline phases over on-disk artifacts:
//!
//! 1. collect: scrape and redact complaints into `data/raw_complaints.json`
//! 2. propose: ask the model for candidate categories (`output/proposed_taxonomy.json`)
//! 3. curate: a person edits the proposal into `output/curated_taxonomy.json`
//! 4. classify: assign every complaint to a curated category
//!
//! Phase 3 never runs automatically; phase 4 refuses to start without a
//! curated taxonomy that is at least as new as the current proposal.

pub mod artifacts;
pub mod config;
pub mod logging;
pub mod pipeline;
pub mod usage_report;

pub use artifacts::{write_atomic, ArtifactStore};
pub use config::{credential, ConfigError, LogFormat, PipelineConfig};
pub use logging::{init_logging, LoggingError};
pub use pipeline::{CurationPrompt, Orchestrator, PhaseReport, PhaseSelection};
pub use usage_report::{render_usage, render_usage_file};
