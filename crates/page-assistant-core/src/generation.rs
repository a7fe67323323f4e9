//! Generation gateway trait.
//!
//! The engine only ever needs "prompt in, completion out". Backends decide
//! sampling details (temperature, top-p) from their own configuration;
//! the engine controls the output bound and stop sequences per call.

use anyhow::Result;

/// One bounded completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: usize,
    /// Sequences that end generation. Not included in the output.
    pub stop: Vec<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: usize, stop: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            stop,
        }
    }
}

/// Prompt → completion text.
pub trait GenerationGateway: Send + Sync {
    /// Returns the model identifier used in logs and reports.
    fn model_name(&self) -> &str;

    /// Run one completion. Blocking.
    fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Merge a call-specific stop list with the backend-wide base list,
/// keeping the call-specific order and dropping duplicates.
pub fn merge_stops(specific: &[&str], base: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(specific.len() + base.len());
    for s in specific.iter().copied().chain(base.iter().map(String::as_str)) {
        if !s.is_empty() && !out.iter().any(|o| o == s) {
            out.push(s.to_string());
        }
    }
    out
}
