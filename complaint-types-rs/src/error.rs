// complaint-types-rs/src/error.rs
// Phase-level error taxonomy surfaced to the orchestrator

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::phase::Phase;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Persisted artifacts, named by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    RawComplaints,
    PartialComplaints,
    ProposedTaxonomy,
    CuratedTaxonomy,
    ClassificationResults,
    UsageLog,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::RawComplaints => "raw-complaint artifact",
            ArtifactKind::PartialComplaints => "partial raw-complaint artifact",
            ArtifactKind::ProposedTaxonomy => "proposed-taxonomy artifact",
            ArtifactKind::CuratedTaxonomy => "curated-taxonomy artifact",
            ArtifactKind::ClassificationResults => "classification-results artifact",
            ArtifactKind::UsageLog => "usage log",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failures that escape a phase.
///
/// Page- and item-level failures never show up here; the collector and the
/// classifier absorb and record them.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input is missing or in the wrong state
    #[error("{phase}: precondition failed ({subject}): {reason}")]
    Precondition {
        phase: Phase,
        subject: String,
        reason: String,
    },

    /// The external classification-request function failed terminally
    #[error("{phase}: external call '{call}' failed: {message}")]
    ExternalCall {
        phase: Phase,
        call: String,
        message: String,
    },

    /// An external response broke its structural contract
    #[error("{phase}: response violated its contract: {message}")]
    Postcondition { phase: Phase, message: String },

    /// Reading or writing a persisted artifact failed
    #[error("{artifact} at {}: {message}", path.display())]
    Artifact {
        artifact: ArtifactKind,
        path: PathBuf,
        message: String,
    },

    /// A phase finished without producing anything worth persisting
    #[error("{phase}: {message}")]
    NoOutput { phase: Phase, message: String },

    #[error("{phase}: cancelled before completion")]
    Cancelled { phase: Phase },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn precondition(
        phase: Phase,
        subject: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::Precondition {
            phase,
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_artifact(phase: Phase, artifact: ArtifactKind, path: &std::path::Path) -> Self {
        PipelineError::precondition(
            phase,
            artifact.label(),
            format!("{} not found", path.display()),
        )
    }

    pub fn external_call(phase: Phase, call: impl Into<String>, message: impl fmt::Display) -> Self {
        PipelineError::ExternalCall {
            phase,
            call: call.into(),
            message: message.to_string(),
        }
    }

    pub fn postcondition(phase: Phase, message: impl Into<String>) -> Self {
        PipelineError::Postcondition {
            phase,
            message: message.into(),
        }
    }

    pub fn artifact(artifact: ArtifactKind, path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        PipelineError::Artifact {
            artifact,
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// The phase the failure occurred in, when known
    pub fn phase(&self) -> Option<Phase> {
        match self {
            PipelineError::Precondition { phase, .. }
            | PipelineError::ExternalCall { phase, .. }
            | PipelineError::Postcondition { phase, .. }
            | PipelineError::NoOutput { phase, .. }
            | PipelineError::Cancelled { phase } => Some(*phase),
            PipelineError::Artifact { .. } | PipelineError::Config(_) => None,
        }
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, PipelineError::Precondition { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }
}
