//! Core abstractions for completion backends
//!
//! `CompletionBackend` is the seam between the pipeline and whatever model
//! provider answers its prompts. The production implementation is
//! `OpenAIClient`; tests substitute in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A fully rendered prompt ready to send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text returned by a backend plus the token accounting it reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Completion {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Anything that can turn a prompt into a completion
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend identifier used in logs
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}
