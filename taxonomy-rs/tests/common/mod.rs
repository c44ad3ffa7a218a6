#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use complaint_types::{Category, Complaint, ComplaintStatus, CuratedTaxonomy};
use llm_sdk::{Completion, CompletionBackend, CompletionRequest, ServiceError};

type Handler = dyn Fn(&CompletionRequest, u32) -> Result<String, ServiceError> + Send + Sync;

/// Backend whose answers are computed from the rendered prompt and the call number
pub struct ScriptedBackend {
    handler: Box<Handler>,
    calls: AtomicU32,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&CompletionRequest, u32) -> Result<String, ServiceError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> llm_sdk::Result<Completion> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        let text = (self.handler)(&request, call)?;
        Ok(Completion {
            text,
            model: request.model,
            input_tokens: 100,
            output_tokens: 10,
        })
    }
}

/// Complaints whose title is the category a well-behaved model would answer
pub fn corpus(titles: &[&str]) -> Vec<Complaint> {
    titles
        .iter()
        .enumerate()
        .map(|(i, title)| Complaint {
            complaint_id: format!("COMPLAINT_{}", i + 1),
            sequence: i as u64 + 1,
            title: title.to_string(),
            body: format!("corpo da reclamação {}", i + 1),
            opened_at: None,
            status: ComplaintStatus::Open,
            public_link: String::new(),
            final_consideration: None,
        })
        .collect()
}

pub fn taxonomy(names: &[&str]) -> CuratedTaxonomy {
    CuratedTaxonomy::new(
        names
            .iter()
            .map(|name| Category::new(*name, format!("about {}", name)))
            .collect(),
    )
    .unwrap()
}

/// Titles in prompt order, read back from `Title: ...` lines
pub fn titles_in(prompt: &str) -> Vec<String> {
    prompt
        .lines()
        .filter_map(|line| line.strip_prefix("Title: "))
        .map(str::to_string)
        .collect()
}

/// Ids in prompt order, read back from `ID: ...` lines
pub fn ids_in(prompt: &str) -> Vec<String> {
    prompt
        .lines()
        .filter_map(|line| line.strip_prefix("ID: "))
        .map(str::to_string)
        .collect()
}

/// Batch answer that echoes each complaint's title as its category
pub fn echo_batch(prompt: &str) -> String {
    let entries: Vec<_> = ids_in(prompt)
        .into_iter()
        .zip(titles_in(prompt))
        .map(|(id, title)| serde_json::json!({"complaint_id": id, "assigned_category": title}))
        .collect();
    serde_json::Value::Array(entries).to_string()
}
