// orchestrator-rs/src/usage_report.rs
// Plain-text rendering of the model usage log

use std::fmt::Write as _;
use std::path::Path;

use llm_sdk::{ServiceError, UsageLog, UsageRecord, UsageSummary, UsageTotals};

/// Read the usage log and render it; an absent log renders as "no usage"
pub async fn render_usage_file(path: &Path, details: bool) -> Result<String, ServiceError> {
    let records = UsageLog::read_all(path).await?;
    Ok(render_usage(&records, details))
}

pub fn render_usage(records: &[UsageRecord], details: bool) -> String {
    if records.is_empty() {
        return "No model usage recorded yet.\n".to_string();
    }

    let summary = UsageSummary::from_records(records);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:>8} {:>6} {:>12} {:>12} {:>10}",
        "PHASE", "SESSIONS", "CALLS", "INPUT", "OUTPUT", "COST USD"
    );
    for (phase, totals) in &summary.by_phase {
        row(&mut out, phase, totals);
    }
    row(&mut out, "total", &summary.overall);

    if details {
        let _ = writeln!(out);
        for record in records {
            let _ = writeln!(
                out,
                "{} {} {} {} in={} out={} ${:.4} {}ms",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.phase,
                record.profile,
                record.model,
                record.input_tokens,
                record.output_tokens,
                record.estimated_cost_usd,
                record.duration_ms
            );
        }
    }
    out
}

fn row(out: &mut String, label: &str, totals: &UsageTotals) {
    let _ = writeln!(
        out,
        "{:<20} {:>8} {:>6} {:>12} {:>12} {:>10.4}",
        label, totals.sessions, totals.calls, totals.input_tokens, totals.output_tokens, totals.estimated_cost_usd
    );
}
