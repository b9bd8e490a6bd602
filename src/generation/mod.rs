//! Test case generation
//!
//! Converts a user story into structured test cases through a pluggable
//! [`GenerationProvider`]. The default provider talks to any
//! OpenAI-compatible chat completions endpoint.

mod chat_completions;
pub mod parser;
pub mod prompt;

pub use chat_completions::ChatCompletionsProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Story fields submitted from the generation form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateRequest {
    pub story_title: String,
    pub description: String,
    pub acceptance_criteria: String,
    pub additional_info: String,
}

impl GenerateRequest {
    /// Title and acceptance criteria are the minimum a provider needs
    pub fn validate(&self) -> Result<(), String> {
        if self.story_title.trim().is_empty() || self.acceptance_criteria.trim().is_empty() {
            return Err("storyTitle and acceptanceCriteria are required".to_string());
        }
        Ok(())
    }
}

/// One generated test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Unique within one response (the UI keys expansion state by it)
    pub id: String,
    pub title: String,
    pub category: String,
    pub expected_result: String,
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data: Option<String>,
}

/// Generated cases plus provider usage information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub cases: Vec<TestCase>,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Errors from a generation provider
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Test generation is not configured: {0}")]
    NotConfigured(String),

    #[error("Generation request failed: {0}")]
    Request(String),

    #[error("Generation provider error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Could not read test cases from model output: {0}")]
    InvalidOutput(String),
}

/// Something that turns a story into test cases
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest)
        -> Result<GenerateResponse, GenerationError>;
}

/// Settings for the chat completions provider
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}
