#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use collector::{FetchFailure, FetchStrategy, PageRequest, StrategyKind};
use complaint_types::{CancellationFlag, Complaint, ComplaintStatus};
use llm_sdk::{Completion, CompletionBackend, CompletionRequest, ServiceError};
use orchestrator::PipelineConfig;

pub const PROPOSAL: &str = r#"[
  {"category_name": "MOTOR", "category_description": "Falhas de motor", "representative_examples": ["carro parou"]},
  {"category_name": "PECAS", "category_description": "Falta de peças", "representative_examples": ["sem peça"]}
]"#;

/// Answers the discovery prompt with `PROPOSAL` and every classification with MOTOR
pub struct FakeModel {
    calls: AtomicU32,
}

impl FakeModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: CompletionRequest) -> llm_sdk::Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = if request.user.contains("recurring complaint themes") {
            PROPOSAL.to_string()
        } else if request.user.contains("Complaint:") {
            "MOTOR".to_string()
        } else {
            return Err(ServiceError::internal("unexpected prompt"));
        };
        Ok(Completion {
            text,
            model: request.model,
            input_tokens: 50,
            output_tokens: 5,
        })
    }
}

/// Listing pages keyed by page number; missing pages are empty listings
pub struct FakeSite {
    pages: BTreeMap<u32, String>,
    cancel_after: Option<(u32, CancellationFlag)>,
}

impl FakeSite {
    pub fn new(pages: BTreeMap<u32, String>) -> Self {
        Self {
            pages,
            cancel_after: None,
        }
    }

    pub fn cancelling_after(mut self, page: u32, flag: CancellationFlag) -> Self {
        self.cancel_after = Some((page, flag));
        self
    }
}

#[async_trait]
impl FetchStrategy for FakeSite {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Http
    }

    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchFailure> {
        if let Some((page, flag)) = &self.cancel_after {
            if request.page == *page {
                flag.cancel();
            }
        }
        Ok(self
            .pages
            .get(&request.page)
            .cloned()
            .unwrap_or_else(|| listing_page(&[])))
    }
}

pub fn listing_page(ids: &[&str]) -> String {
    let listings: Vec<String> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "title": format!("Motor falhou {}", id),
                "description": "O carro parou na estrada.<br>Contato: cliente@example.com",
                "created": "2024-05-10T08:30:00",
                "status": "PENDING",
                "url": format!("reclamacao_{}", id),
                "solved": false
            })
            .to_string()
        })
        .collect();
    format!(
        r#"<html><script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{"complaints":{{"LAST":[{}]}}}}}}}}</script></html>"#,
        listings.join(",")
    )
}

/// Three pages of two listings each
pub fn small_site() -> BTreeMap<u32, String> {
    BTreeMap::from([
        (1, listing_page(&["a1", "a2"])),
        (2, listing_page(&["b1", "b2"])),
        (3, listing_page(&["c1", "c2"])),
    ])
}

pub fn config_in(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.data_dir = root.join("data");
    config.paths.output_dir = root.join("output");
    config.paths.agents_dir = root.join("agents");
    config.collection.page_ceiling = 5;
    config.collection.request_delay_ms = 0;
    config.classification.initial_backoff_ms = 1;
    config.classification.max_backoff_ms = 1;
    config
}

pub fn complaints(count: usize) -> Vec<Complaint> {
    (1..=count)
        .map(|i| Complaint {
            complaint_id: format!("COMPLAINT_{}", i),
            sequence: i as u64,
            title: format!("Motor {}", i),
            body: "O carro parou".to_string(),
            opened_at: None,
            status: ComplaintStatus::Open,
            public_link: String::new(),
            final_consideration: None,
        })
        .collect()
}

pub fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

pub fn curated_json() -> serde_json::Value {
    serde_json::json!({
        "status": "curated",
        "categories": [
            {"name": "MOTOR", "description": "Falhas de motor"},
            {"name": "PECAS", "description": "Falta de peças"}
        ]
    })
}
