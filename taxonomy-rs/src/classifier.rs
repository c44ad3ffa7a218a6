// taxonomy-rs/src/classifier.rs
//
// Classification of the full corpus against a curated taxonomy.
//
// Every complaint moves through Pending -> Submitted -> (Assigned | Failed).
// Work proceeds in rounds: pending items are grouped into units (one
// complaint in single mode, `batch_size` in batch mode), units run
// concurrently up to `max_concurrency`, and whatever is still pending after
// a round waits out the backoff before the next one. A unit failure only
// costs its items one attempt; an answer naming a category outside the
// taxonomy fails that item on the spot.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use complaint_types::{
    CancellationFlag, ClassificationArtifact, ClassificationResult, ClassificationSummary, Complaint,
    CuratedTaxonomy, FailedItem, Phase, PipelineError,
};
use futures::future::join_all;
use llm_sdk::profile::{COMPLAINT_CLASSIFIER, COMPLAINT_CLASSIFIER_BATCH};
use llm_sdk::TemplateValues;
use tokio::sync::Semaphore;

use crate::gateway::{ClassificationGateway, GatewayError};
use crate::response::{parse_batch, parse_single, BatchAssignment};

/// Reason recorded for items left pending when a run is cancelled
pub const CANCELLED_REASON: &str = "cancelled";

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOptions {
    /// Complaints per call; 1 selects single mode
    pub batch_size: usize,
    /// Corpora this small are classified one complaint per call
    pub batch_threshold: usize,
    pub max_concurrency: usize,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
    /// Body characters sent per complaint in batch mode
    pub excerpt_chars: usize,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_threshold: 20,
            max_concurrency: 4,
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
            excerpt_chars: 500,
        }
    }
}

impl ClassifierOptions {
    /// Wait before retry round `round` (0-based)
    pub fn backoff(&self, round: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(round.min(32) as i32);
        let wait = self.initial_backoff.as_secs_f64() * factor;
        Duration::from_secs_f64(wait.min(self.max_backoff.as_secs_f64()))
    }

    fn unit_size(&self, corpus: usize) -> usize {
        if self.batch_size <= 1 || corpus <= self.batch_threshold {
            1
        } else {
            self.batch_size
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ItemState {
    Pending,
    Submitted,
    Assigned(String),
    Failed(String),
}

#[derive(Debug)]
struct WorkItem<'a> {
    complaint: &'a Complaint,
    state: ItemState,
    attempts: u32,
    last_error: Option<String>,
}

pub struct Classifier {
    gateway: ClassificationGateway,
    options: ClassifierOptions,
}

impl Classifier {
    pub fn new(gateway: ClassificationGateway, options: ClassifierOptions) -> Self {
        Self { gateway, options }
    }

    pub fn options(&self) -> &ClassifierOptions {
        &self.options
    }

    /// Classify every complaint. Isolated item failures are recorded, not fatal.
    pub async fn classify(
        &self,
        complaints: &[Complaint],
        taxonomy: &CuratedTaxonomy,
        cancel: &CancellationFlag,
    ) -> Result<ClassificationArtifact, PipelineError> {
        let taxonomy_text = taxonomy.render_lines();
        let unit_size = self.options.unit_size(complaints.len());
        let max_attempts = self.options.max_attempts.max(1);
        let semaphore = Semaphore::new(self.options.max_concurrency.max(1));

        let mut items: Vec<WorkItem<'_>> = complaints
            .iter()
            .map(|complaint| WorkItem {
                complaint,
                state: ItemState::Pending,
                attempts: 0,
                last_error: None,
            })
            .collect();

        tracing::info!(
            complaints = complaints.len(),
            categories = taxonomy.len(),
            mode = if unit_size == 1 { "single" } else { "batch" },
            unit_size,
            "starting classification"
        );

        let mut round: u32 = 0;
        loop {
            let pending: Vec<usize> = items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.state == ItemState::Pending)
                .map(|(index, _)| index)
                .collect();
            if pending.is_empty() {
                break;
            }

            if round > 0 {
                let wait = self.options.backoff(round - 1);
                tracing::info!(round, pending = pending.len(), ?wait, "retrying pending complaints");
                tokio::time::sleep(wait).await;
            }

            if cancel.is_cancelled() {
                for &index in &pending {
                    items[index].state = ItemState::Failed(CANCELLED_REASON.to_string());
                }
                tracing::warn!(abandoned = pending.len(), "classification cancelled");
                return Err(PipelineError::Cancelled { phase: Phase::Classify });
            }

            for &index in &pending {
                items[index].state = ItemState::Submitted;
                items[index].attempts += 1;
            }

            let units: Vec<Vec<usize>> = pending.chunks(unit_size).map(<[usize]>::to_vec).collect();
            let calls = units.iter().map(|unit| {
                let members: Vec<&Complaint> = unit.iter().map(|&index| items[index].complaint).collect();
                let semaphore = &semaphore;
                let taxonomy_text = taxonomy_text.as_str();
                async move {
                    let _permit = semaphore.acquire().await;
                    self.submit(&members, taxonomy_text, unit_size == 1).await
                }
            });
            let outcomes = join_all(calls).await;

            for (unit, outcome) in units.iter().zip(outcomes) {
                match outcome {
                    Ok(assignments) => apply_assignments(&mut items, unit, assignments, taxonomy),
                    Err(GatewayError::Configuration(err)) => {
                        return Err(PipelineError::Config(err.to_string()));
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        tracing::warn!(items = unit.len(), error = %reason, "classification call failed");
                        for &index in unit {
                            items[index].last_error = Some(reason.clone());
                        }
                    }
                }
            }

            // Whatever is still Submitted got no usable answer this round
            for item in items.iter_mut().filter(|item| item.state == ItemState::Submitted) {
                if item.attempts >= max_attempts {
                    let reason = item
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "no answer for this complaint".to_string());
                    tracing::warn!(
                        complaint_id = %item.complaint.complaint_id,
                        attempts = item.attempts,
                        %reason,
                        "complaint failed after exhausting retries"
                    );
                    item.state = ItemState::Failed(reason);
                } else {
                    item.state = ItemState::Pending;
                }
            }

            round += 1;
        }

        Ok(build_artifact(complaints.len(), &items, taxonomy))
    }

    /// One call for a unit; the returned assignments may cover only part of it
    async fn submit(
        &self,
        members: &[&Complaint],
        taxonomy_text: &str,
        single: bool,
    ) -> Result<Vec<BatchAssignment>, GatewayError> {
        if single {
            let complaint = members[0];
            let values = TemplateValues::new()
                .set("taxonomy_text", taxonomy_text)
                .set("complaint_text", complaint.prompt_text());
            let text = self.gateway.call(COMPLAINT_CLASSIFIER, &values).await?;
            let category = parse_single(&text).map_err(|e| GatewayError::Postcondition(e.to_string()))?;
            return Ok(vec![BatchAssignment {
                complaint_id: complaint.complaint_id.clone(),
                assigned_category: category,
            }]);
        }

        let complaints_text = members
            .iter()
            .map(|c| format!("ID: {}\n{}", c.complaint_id, c.excerpt(self.options.excerpt_chars)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let values = TemplateValues::new()
            .set("taxonomy_text", taxonomy_text)
            .set("complaints_text", complaints_text);
        let text = self.gateway.call(COMPLAINT_CLASSIFIER_BATCH, &values).await?;
        parse_batch(&text).map_err(|e| GatewayError::Postcondition(e.to_string()))
    }
}

fn apply_assignments(
    items: &mut [WorkItem<'_>],
    unit: &[usize],
    assignments: Vec<BatchAssignment>,
    taxonomy: &CuratedTaxonomy,
) {
    let by_id: HashMap<&str, usize> = unit
        .iter()
        .map(|&index| (items[index].complaint.complaint_id.as_str(), index))
        .collect();
    let mut answered: HashSet<usize> = HashSet::new();
    let mut updates: Vec<(usize, ItemState)> = Vec::new();

    for assignment in assignments {
        let Some(&index) = by_id.get(assignment.complaint_id.as_str()) else {
            tracing::warn!(complaint_id = %assignment.complaint_id, "answer for a complaint outside the batch ignored");
            continue;
        };
        if !answered.insert(index) {
            tracing::debug!(complaint_id = %assignment.complaint_id, "duplicate answer ignored");
            continue;
        }

        if taxonomy.contains(&assignment.assigned_category) {
            updates.push((index, ItemState::Assigned(assignment.assigned_category)));
        } else {
            tracing::warn!(
                complaint_id = %assignment.complaint_id,
                category = %assignment.assigned_category,
                "answer names a category outside the curated taxonomy"
            );
            updates.push((
                index,
                ItemState::Failed(format!(
                    "unknown category '{}' not in curated taxonomy",
                    assignment.assigned_category
                )),
            ));
        }
    }

    for (index, state) in updates {
        items[index].state = state;
    }
    for &index in unit {
        if items[index].state == ItemState::Submitted {
            items[index].last_error = Some("complaint missing from batch answer".to_string());
        }
    }
}

fn build_artifact(total: usize, items: &[WorkItem<'_>], taxonomy: &CuratedTaxonomy) -> ClassificationArtifact {
    let mut results = Vec::new();
    let mut failed = Vec::new();
    for item in items {
        match &item.state {
            ItemState::Assigned(category) => results.push(ClassificationResult {
                complaint_id: item.complaint.complaint_id.clone(),
                assigned_category: category.clone(),
            }),
            ItemState::Failed(reason) => failed.push(FailedItem {
                complaint_id: item.complaint.complaint_id.clone(),
                reason: reason.clone(),
                attempts: item.attempts,
            }),
            ItemState::Pending | ItemState::Submitted => {}
        }
    }

    tracing::info!(assigned = results.len(), failed = failed.len(), "classification finished");
    let summary = ClassificationSummary::from_results(total, &results, &failed);
    ClassificationArtifact {
        taxonomy_used: taxonomy.categories().to_vec(),
        classification_results: results,
        failed_items: failed,
        summary,
    }
}
