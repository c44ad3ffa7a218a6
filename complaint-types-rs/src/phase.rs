//! Pipeline phases

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four pipeline phases, in execution order.
///
/// `Curate` is performed by a human editing the curated taxonomy artifact;
/// the pipeline only ever checks its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Collect,
    Propose,
    Curate,
    Classify,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Collect, Phase::Propose, Phase::Curate, Phase::Classify];

    pub fn number(&self) -> u8 {
        match self {
            Phase::Collect => 1,
            Phase::Propose => 2,
            Phase::Curate => 3,
            Phase::Classify => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Collect => "collect",
            Phase::Propose => "propose",
            Phase::Curate => "curate",
            Phase::Classify => "classify",
        }
    }

    /// Label stored on usage records
    pub fn usage_label(&self) -> String {
        format!("phase{}-{}", self.number(), self.name())
    }

    pub fn is_automated(&self) -> bool {
        !matches!(self, Phase::Curate)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase {} ({})", self.number(), self.name())
    }
}
