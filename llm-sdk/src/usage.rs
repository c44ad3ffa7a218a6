//! Token usage accounting and cost estimation
//!
//! Every completion call appends one JSON line to the usage log. The log is
//! append-only; summaries are computed by reading it back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{Result, ServiceError};

/// Price in USD per one million tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

/// Per-model prices with a fallback for unknown models
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: BTreeMap<String, ModelPrice>,
    fallback: String,
}

pub static DEFAULT_PRICING: Lazy<PricingTable> = Lazy::new(|| {
    PricingTable::new("gpt-4o-mini")
        .with_price("gpt-4o-mini", 0.150, 0.600)
        .with_price("gpt-4o", 2.50, 10.00)
        .with_price("gpt-4-turbo", 10.00, 30.00)
});

impl PricingTable {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            prices: BTreeMap::new(),
            fallback: fallback.into(),
        }
    }

    pub fn with_price(mut self, model: impl Into<String>, input: f64, output: f64) -> Self {
        self.prices.insert(model.into(), ModelPrice { input, output });
        self
    }

    /// Exact match, then the longest known prefix (dated snapshots), then the fallback
    pub fn price_for(&self, model: &str) -> ModelPrice {
        if let Some(price) = self.prices.get(model) {
            return *price;
        }

        self.prices
            .iter()
            .filter(|(known, _)| model.starts_with(known.as_str()))
            .max_by_key(|(known, _)| known.len())
            .map(|(_, price)| *price)
            .or_else(|| self.prices.get(&self.fallback).copied())
            .unwrap_or(ModelPrice { input: 0.0, output: 0.0 })
    }

    /// Estimated cost in USD, rounded to 4 decimals
    pub fn estimate(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let price = self.price_for(model);
        let cost = (input_tokens as f64 / 1_000_000.0) * price.input
            + (output_tokens as f64 / 1_000_000.0) * price.output;
        round4(cost)
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// One completion call as recorded in the usage log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    /// Identifies one phase run; all calls of a run share it
    pub session_id: String,
    pub phase: String,
    pub profile: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub estimated_cost_usd: f64,
    pub duration_ms: u64,
}

/// Aggregated usage for a set of records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub calls: usize,
    pub sessions: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
}

impl UsageTotals {
    fn add(&mut self, record: &UsageRecord) {
        self.calls += 1;
        self.input_tokens += u64::from(record.input_tokens);
        self.output_tokens += u64::from(record.output_tokens);
        self.total_tokens += u64::from(record.total_tokens);
        self.estimated_cost_usd = round4(self.estimated_cost_usd + record.estimated_cost_usd);
    }
}

/// Totals across the whole log plus a breakdown by phase
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    pub overall: UsageTotals,
    pub by_phase: BTreeMap<String, UsageTotals>,
}

impl UsageSummary {
    pub fn from_records(records: &[UsageRecord]) -> Self {
        let mut summary = UsageSummary::default();
        let mut sessions: BTreeMap<&str, std::collections::BTreeSet<&str>> = BTreeMap::new();

        for record in records {
            summary.overall.add(record);
            summary.by_phase.entry(record.phase.clone()).or_default().add(record);
            sessions.entry(record.phase.as_str()).or_default().insert(record.session_id.as_str());
        }

        for (phase, ids) in &sessions {
            if let Some(totals) = summary.by_phase.get_mut(*phase) {
                totals.sessions = ids.len();
            }
        }
        summary.overall.sessions = sessions.values().map(|ids| ids.len()).sum();
        summary
    }
}

/// Append-only JSON Lines usage log for one phase run
#[derive(Debug)]
pub struct UsageLog {
    path: PathBuf,
    session_id: String,
    phase: String,
    pricing: PricingTable,
    session: Mutex<Vec<UsageRecord>>,
}

impl UsageLog {
    pub fn new(path: impl Into<PathBuf>, phase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: crate::util::generate_request_id(),
            phase: phase.into(),
            pricing: DEFAULT_PRICING.clone(),
            session: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one call: priced, appended to the file, and kept for the session summary
    pub async fn record(
        &self,
        profile: &str,
        model: &str,
        input_tokens: u32,
        output_tokens: u32,
        duration: Duration,
    ) -> Result<UsageRecord> {
        let record = UsageRecord {
            timestamp: Utc::now(),
            session_id: self.session_id.clone(),
            phase: self.phase.clone(),
            profile: profile.to_string(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            estimated_cost_usd: self
                .pricing
                .estimate(model, u64::from(input_tokens), u64::from(output_tokens)),
            duration_ms: duration.as_millis() as u64,
        };

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        // The lock serializes appends so concurrent calls never interleave lines
        let mut session = self.session.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| io_error(&self.path, e))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        file.write_all(line.as_bytes()).await.map_err(|e| io_error(&self.path, e))?;
        file.flush().await.map_err(|e| io_error(&self.path, e))?;

        session.push(record.clone());
        Ok(record)
    }

    /// Records made through this log instance
    pub async fn session_records(&self) -> Vec<UsageRecord> {
        self.session.lock().await.clone()
    }

    pub async fn session_totals(&self) -> UsageTotals {
        let records = self.session.lock().await;
        UsageSummary::from_records(&records).overall
    }

    /// Read every record in a usage log; a missing file is an empty log.
    ///
    /// Lines that do not parse are skipped with a warning.
    pub async fn read_all(path: &Path) -> Result<Vec<UsageRecord>> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(path, e)),
        };

        let mut records = Vec::new();
        for (index, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<UsageRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("skipping malformed usage line {} in {}: {}", index + 1, path.display(), e),
            }
        }
        Ok(records)
    }
}

fn io_error(path: &Path, err: std::io::Error) -> ServiceError {
    ServiceError::internal(format!("usage log {}: {}", path.display(), err))
}
