// orchestrator-rs/src/pipeline.rs
//
// Phase-gated pipeline runner.
//
// Phases run strictly in order: collect -> propose -> (human curation) ->
// classify. Each phase checks its input artifacts and the credential before
// the first external call, writes only its own artifact, and replaces it
// atomically. Running "all" halts at the first fatal failure and leaves the
// artifacts of completed phases untouched.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use collector::{Collector, FetchStrategy};
use complaint_types::{ArtifactKind, CancellationFlag, Phase, PipelineError};
use llm_sdk::{CompletionBackend, OpenAIClient, ProfileRegistry, UsageLog};
use taxonomy::{ClassificationGateway, Classifier, TaxonomyProposer};

use crate::artifacts::ArtifactStore;
use crate::config::PipelineConfig;

/// What a `run` invocation should execute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseSelection {
    One(Phase),
    All,
}

impl FromStr for PhaseSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "phase1" | "collect" => Ok(PhaseSelection::One(Phase::Collect)),
            "2" | "phase2" | "propose" => Ok(PhaseSelection::One(Phase::Propose)),
            "4" | "phase4" | "classify" => Ok(PhaseSelection::One(Phase::Classify)),
            "all" => Ok(PhaseSelection::All),
            "3" | "phase3" | "curate" => Err(
                "phase 3 is manual curation: review output/proposed_taxonomy.json and save the final \
                 categories as output/curated_taxonomy.json, then run phase 4"
                    .to_string(),
            ),
            other => Err(format!(
                "unknown phase '{}', expected 1, 2, 4 or all (also phase1, collect, ...)",
                other
            )),
        }
    }
}

/// Outcome of one completed phase
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseReport {
    Collected {
        complaints: usize,
        pages: u32,
        skipped_pages: usize,
        fallback_pages: u32,
        path: PathBuf,
    },
    Proposed {
        categories: usize,
        sample_size: usize,
        total_complaints: usize,
        path: PathBuf,
    },
    Classified {
        total: usize,
        assigned: usize,
        failed: usize,
        path: PathBuf,
    },
}

impl PhaseReport {
    pub fn phase(&self) -> Phase {
        match self {
            PhaseReport::Collected { .. } => Phase::Collect,
            PhaseReport::Proposed { .. } => Phase::Propose,
            PhaseReport::Classified { .. } => Phase::Classify,
        }
    }
}

impl fmt::Display for PhaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseReport::Collected {
                complaints,
                pages,
                skipped_pages,
                fallback_pages,
                path,
            } => write!(
                f,
                "{}: {} complaints from {} pages ({} skipped, {} via fallback) -> {}",
                self.phase(),
                complaints,
                pages,
                skipped_pages,
                fallback_pages,
                path.display()
            ),
            PhaseReport::Proposed {
                categories,
                sample_size,
                total_complaints,
                path,
            } => write!(
                f,
                "{}: {} categories from a sample of {}/{} -> {} (awaiting curation)",
                self.phase(),
                categories,
                sample_size,
                total_complaints,
                path.display()
            ),
            PhaseReport::Classified {
                total,
                assigned,
                failed,
                path,
            } => write!(
                f,
                "{}: {} of {} complaints classified, {} failed -> {}",
                self.phase(),
                assigned,
                total,
                failed,
                path.display()
            ),
        }
    }
}

/// Lets an operator finish curation while an `all` run waits
#[async_trait]
pub trait CurationPrompt: Send + Sync {
    /// Block until the operator says curation is done; `false` gives up
    async fn wait_for_curation(&self, proposed: &Path, curated: &Path, reason: &str) -> bool;
}

/// Runs pipeline phases against one configuration
pub struct Orchestrator {
    config: PipelineConfig,
    store: ArtifactStore,
    credential: Option<String>,
    backend: Option<Arc<dyn CompletionBackend>>,
    fetchers: Option<(Arc<dyn FetchStrategy>, Option<Arc<dyn FetchStrategy>>)>,
    curation_prompt: Option<Arc<dyn CurationPrompt>>,
    cancel: CancellationFlag,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, credential: Option<String>) -> Self {
        let store = ArtifactStore::new(config.paths.clone());
        Self {
            config,
            store,
            credential,
            backend: None,
            fetchers: None,
            curation_prompt: None,
            cancel: CancellationFlag::new(),
        }
    }

    /// Use this backend instead of building an OpenAI client from the credential
    pub fn with_backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use these fetch strategies instead of HTTP plus headless browser
    pub fn with_fetch_strategies(
        mut self,
        primary: Arc<dyn FetchStrategy>,
        secondary: Option<Arc<dyn FetchStrategy>>,
    ) -> Self {
        self.fetchers = Some((primary, secondary));
        self
    }

    pub fn with_curation_prompt(mut self, prompt: Arc<dyn CurationPrompt>) -> Self {
        self.curation_prompt = Some(prompt);
        self
    }

    /// Handle for stopping the run from elsewhere, e.g. a signal handler
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn run(&self, selection: PhaseSelection) -> Result<Vec<PhaseReport>, PipelineError> {
        match selection {
            PhaseSelection::One(phase) => Ok(vec![self.run_phase(phase).await?]),
            PhaseSelection::All => self.run_all().await,
        }
    }

    async fn run_all(&self) -> Result<Vec<PhaseReport>, PipelineError> {
        let mut reports = Vec::new();
        for phase in Phase::ALL {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled { phase });
            }
            if !phase.is_automated() {
                self.curation_gate().await?;
                continue;
            }
            let report = self.run_phase(phase).await?;
            tracing::info!("{}", report);
            reports.push(report);
        }
        Ok(reports)
    }

    pub async fn run_phase(&self, phase: Phase) -> Result<PhaseReport, PipelineError> {
        tracing::info!(%phase, "phase starting");
        let result = match phase {
            Phase::Collect => self.collect().await,
            Phase::Propose => self.propose().await,
            Phase::Curate => Err(PipelineError::precondition(
                Phase::Curate,
                ArtifactKind::CuratedTaxonomy.label(),
                format!(
                    "curation is manual: review {} and save the final categories as {}",
                    self.store.path(ArtifactKind::ProposedTaxonomy).display(),
                    self.store.path(ArtifactKind::CuratedTaxonomy).display()
                ),
            )),
            Phase::Classify => self.classify().await,
        };

        if let Err(err) = &result {
            tracing::error!(%phase, error = %err, "phase failed");
        }
        result
    }

    async fn collect(&self) -> Result<PhaseReport, PipelineError> {
        let options = self.config.collection.options();
        let collector = match &self.fetchers {
            Some((primary, secondary)) => Collector::from_strategies(primary.clone(), secondary.clone(), options),
            None => Collector::new(options)
                .map_err(|e| PipelineError::Config(format!("cannot build the page fetcher: {}", e)))?,
        };

        let report = collector.collect(&self.cancel).await;

        if report.cancelled {
            if !report.complaints.is_empty() {
                let path = self
                    .store
                    .write(ArtifactKind::PartialComplaints, &report.to_partial())
                    .await?;
                tracing::warn!(
                    complaints = report.complaints.len(),
                    path = %path.display(),
                    "collection interrupted, partial artifact written"
                );
            }
            return Err(PipelineError::Cancelled { phase: Phase::Collect });
        }

        if report.complaints.is_empty() {
            return Err(PipelineError::NoOutput {
                phase: Phase::Collect,
                message: format!(
                    "no complaints collected ({} of {} pages skipped); the raw-complaint artifact was left as it was",
                    report.skipped_pages.len(),
                    report.last_page
                ),
            });
        }

        let path = self.store.write(ArtifactKind::RawComplaints, &report.complaints).await?;
        self.store.remove(ArtifactKind::PartialComplaints).await?;

        for skipped in &report.skipped_pages {
            tracing::warn!(page = skipped.page, reason = %skipped.reason, "page missing from this collection");
        }

        Ok(PhaseReport::Collected {
            complaints: report.complaints.len(),
            pages: report.pages_fetched,
            skipped_pages: report.skipped_pages.len(),
            fallback_pages: report.fallback_pages,
            path,
        })
    }

    async fn propose(&self) -> Result<PhaseReport, PipelineError> {
        let phase = Phase::Propose;
        let complaints = self.store.load_complaints(phase).await?;
        let backend = self.backend(phase)?;
        let (gateway, usage) = self.gateway(phase, backend)?;

        let proposed = TaxonomyProposer::new(gateway, self.config.discovery.options())
            .propose(&complaints)
            .await;
        self.report_usage(&usage).await;
        let proposed = proposed?;

        let path = self.store.write(ArtifactKind::ProposedTaxonomy, &proposed).await?;
        Ok(PhaseReport::Proposed {
            categories: proposed.proposed_categories.len(),
            sample_size: proposed.sample_size,
            total_complaints: proposed.total_complaints,
            path,
        })
    }

    async fn classify(&self) -> Result<PhaseReport, PipelineError> {
        let phase = Phase::Classify;
        let complaints = self.store.load_complaints(phase).await?;
        let taxonomy = self.store.load_curated(phase).await?;
        self.ensure_curation_current(phase)?;
        let backend = self.backend(phase)?;
        let (gateway, usage) = self.gateway(phase, backend)?;

        let artifact = Classifier::new(gateway, self.config.classification.options())
            .classify(&complaints, &taxonomy, &self.cancel)
            .await;
        self.report_usage(&usage).await;
        let artifact = artifact?;

        let path = self.store.write(ArtifactKind::ClassificationResults, &artifact).await?;
        for share in &artifact.summary.category_distribution {
            tracing::info!(category = %share.category, count = share.count, percentage = share.percentage, "distribution");
        }

        Ok(PhaseReport::Classified {
            total: artifact.summary.total_complaints,
            assigned: artifact.classification_results.len(),
            failed: artifact.failed_items.len(),
            path,
        })
    }

    /// Between propose and classify in an `all` run
    async fn curation_gate(&self) -> Result<(), PipelineError> {
        loop {
            let reason = match self.curation_problem().await {
                None => return Ok(()),
                Some(reason) => reason,
            };

            let proposed = self.store.path(ArtifactKind::ProposedTaxonomy);
            let curated = self.store.path(ArtifactKind::CuratedTaxonomy);
            let keep_waiting = match &self.curation_prompt {
                Some(prompt) => prompt.wait_for_curation(&proposed, &curated, &reason).await,
                None => false,
            };

            if !keep_waiting || self.cancel.is_cancelled() {
                return Err(PipelineError::precondition(
                    Phase::Curate,
                    ArtifactKind::CuratedTaxonomy.label(),
                    format!(
                        "awaiting curation: {}. Review {}, save the final categories as {}, then run phase 4",
                        reason,
                        proposed.display(),
                        curated.display()
                    ),
                ));
            }
        }
    }

    async fn curation_problem(&self) -> Option<String> {
        if let Err(err) = self.store.load_curated(Phase::Curate).await {
            return Some(match err {
                PipelineError::Precondition { reason, .. } => reason,
                other => other.to_string(),
            });
        }
        self.ensure_curation_current(Phase::Curate)
            .err()
            .map(|err| match err {
                PipelineError::Precondition { reason, .. } => reason,
                other => other.to_string(),
            })
    }

    /// A curated taxonomy older than the current proposal belongs to an earlier run
    fn ensure_curation_current(&self, phase: Phase) -> Result<(), PipelineError> {
        let proposed = self.store.modified(ArtifactKind::ProposedTaxonomy);
        let curated = self.store.modified(ArtifactKind::CuratedTaxonomy);
        match (proposed, curated) {
            (Some(proposed), Some(curated)) if curated < proposed => Err(PipelineError::precondition(
                phase,
                ArtifactKind::CuratedTaxonomy.label(),
                format!(
                    "{} is older than {}; curate the new proposal first",
                    self.store.path(ArtifactKind::CuratedTaxonomy).display(),
                    self.store.path(ArtifactKind::ProposedTaxonomy).display()
                ),
            )),
            _ => Ok(()),
        }
    }

    fn backend(&self, phase: Phase) -> Result<Arc<dyn CompletionBackend>, PipelineError> {
        if let Some(backend) = &self.backend {
            return Ok(backend.clone());
        }

        let api_key = self.credential.as_deref().ok_or_else(|| {
            PipelineError::precondition(phase, "credential", "OPENAI_API_KEY is not set (environment or .env)")
        })?;

        let llm = &self.config.llm;
        let mut builder = OpenAIClient::builder()
            .api_key(api_key)
            .timeout(llm.request_timeout_secs)
            .retry(llm.retry());
        if let Some(base_url) = &llm.base_url {
            builder = builder.base_url(base_url.clone());
        }
        if let Some(org_id) = &llm.org_id {
            builder = builder.org_id(org_id.clone());
        }

        let client = builder
            .build()
            .map_err(|e| PipelineError::Config(format!("cannot build the model client: {}", e)))?;
        Ok(Arc::new(client))
    }

    fn gateway(
        &self,
        phase: Phase,
        backend: Arc<dyn CompletionBackend>,
    ) -> Result<(ClassificationGateway, Arc<UsageLog>), PipelineError> {
        let profiles = ProfileRegistry::builtin()
            .with_overrides_from(&self.config.paths.agents_dir)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        let usage = Arc::new(UsageLog::new(self.store.path(ArtifactKind::UsageLog), phase.usage_label()));

        let gateway = ClassificationGateway::new(backend, self.config.llm.model.clone())
            .with_profiles(profiles)
            .with_call_timeout(Duration::from_secs(self.config.llm.call_timeout_secs))
            .with_usage_log(usage.clone());
        Ok((gateway, usage))
    }

    async fn report_usage(&self, usage: &UsageLog) {
        if !self.config.llm.show_usage {
            return;
        }
        let totals = usage.session_totals().await;
        tracing::info!(
            calls = totals.calls,
            input_tokens = totals.input_tokens,
            output_tokens = totals.output_tokens,
            estimated_cost_usd = totals.estimated_cost_usd,
            "model usage for this run"
        );

        if self.config.llm.show_usage_details {
            for record in usage.session_records().await {
                tracing::info!(
                    profile = %record.profile,
                    model = %record.model,
                    input_tokens = record.input_tokens,
                    output_tokens = record.output_tokens,
                    cost = record.estimated_cost_usd,
                    duration_ms = record.duration_ms,
                    "model call"
                );
            }
        }
    }
}
