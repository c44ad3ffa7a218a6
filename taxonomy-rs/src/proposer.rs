//! Taxonomy proposal from a random sample of the corpus

use complaint_types::{Complaint, Phase, PipelineError, ProposedTaxonomy};
use llm_sdk::profile::THEME_DISCOVERY;
use llm_sdk::TemplateValues;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::gateway::{ClassificationGateway, GatewayError};
use crate::response::parse_proposal;

/// Sampling and category-count targets for one proposal
#[derive(Debug, Clone, PartialEq)]
pub struct ProposerOptions {
    pub sample_size: usize,
    pub min_categories: usize,
    pub max_categories: usize,
    /// Fixed seed for a reproducible sample; OS entropy when unset
    pub seed: Option<u64>,
}

impl Default for ProposerOptions {
    fn default() -> Self {
        Self {
            sample_size: 200,
            min_categories: 6,
            max_categories: 10,
            seed: None,
        }
    }
}

/// Uniform sample without replacement, in corpus order. `k` is clamped to the corpus size.
pub fn sample_complaints<'a>(complaints: &'a [Complaint], k: usize, seed: Option<u64>) -> Vec<&'a Complaint> {
    let k = k.min(complaints.len());
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut picked = index::sample(&mut rng, complaints.len(), k).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|index| &complaints[index]).collect()
}

/// Sample block as the prompt presents it
pub fn format_sample(sample: &[&Complaint]) -> String {
    sample
        .iter()
        .map(|c| format!("Complaint {}:\n{}", c.complaint_id, c.prompt_text()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub struct TaxonomyProposer {
    gateway: ClassificationGateway,
    options: ProposerOptions,
}

impl TaxonomyProposer {
    pub fn new(gateway: ClassificationGateway, options: ProposerOptions) -> Self {
        Self { gateway, options }
    }

    /// Sample, ask the model for categories and validate them.
    ///
    /// Any failure is fatal for the phase: a partial taxonomy is never returned.
    pub async fn propose(&self, complaints: &[Complaint]) -> Result<ProposedTaxonomy, PipelineError> {
        if complaints.is_empty() {
            return Err(PipelineError::NoOutput {
                phase: Phase::Propose,
                message: "no complaints to sample".to_string(),
            });
        }

        let sample = sample_complaints(complaints, self.options.sample_size, self.options.seed);
        if sample.len() < self.options.sample_size {
            tracing::info!(
                requested = self.options.sample_size,
                available = complaints.len(),
                "sample size clamped to corpus size"
            );
        }

        let values = TemplateValues::new()
            .set("min_categories", self.options.min_categories)
            .set("max_categories", self.options.max_categories)
            .set("complaints_sample", format_sample(&sample));

        tracing::info!(
            sample = sample.len(),
            total = complaints.len(),
            min = self.options.min_categories,
            max = self.options.max_categories,
            "requesting taxonomy proposal"
        );

        let text = self
            .gateway
            .call(THEME_DISCOVERY, &values)
            .await
            .map_err(|err| match err {
                GatewayError::Configuration(source) => PipelineError::Config(source.to_string()),
                GatewayError::Postcondition(message) => PipelineError::postcondition(Phase::Propose, message),
                GatewayError::External(source) => PipelineError::external_call(Phase::Propose, THEME_DISCOVERY, source),
            })?;

        let categories = parse_proposal(&text)
            .map_err(|err| PipelineError::postcondition(Phase::Propose, err.to_string()))?;

        let count = categories.len();
        if count < self.options.min_categories || count > self.options.max_categories {
            tracing::warn!(
                count,
                min = self.options.min_categories,
                max = self.options.max_categories,
                "proposed category count outside the requested range"
            );
        }

        tracing::info!(categories = count, "taxonomy proposed, awaiting curation");
        Ok(ProposedTaxonomy::new(sample.len(), complaints.len(), categories))
    }
}
