//! Core data models shared by the engine, its backends and its callers.
//!
//! These types describe the chunks derived from a loaded page, the
//! structure hints passed to [`describe_structure`](crate::engine::PageAssistant::describe_structure),
//! and the [`GenerationResult`] returned by every boundary operation.

use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

/// An ordered fragment of the loaded context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position of the chunk in document order, starting at 0.
    pub index: usize,
    /// Decoded text of the token window.
    pub text: String,
    /// Offset of the window's first token in the source token sequence.
    pub token_start: usize,
    /// Number of tokens in the window (never more than the window size).
    pub token_count: usize,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A page heading, as produced by the content-extraction layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// A landmark section of the page (navigation, main, footer, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub role: String,
}

/// Outcome of an `answer`, `summarize` or `describe_structure` call.
///
/// Always returned, never raised: failures are carried in [`error`](Self::error)
/// alongside whatever telemetry was collected before the failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationResult {
    /// Generated text. Empty when `error` is set.
    pub text: String,
    /// Wall-clock time spent in the operation.
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Conservative resource estimate (accelerator memory, MB).
    pub resource_usage_mb: f64,
    /// Number of generation-gateway calls made.
    pub calls: u32,
    /// Set when the result was produced under a degraded condition
    /// (retrieval fallback to a single chunk, a failed summary group).
    pub degraded: bool,
    /// Error description, if the operation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResult {
    /// A failed result carrying only the error message.
    pub fn failed(error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a `load()` call, for collaborators that want to log it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    /// Number of chunks produced by the segmenter.
    pub chunks: usize,
    /// Token count of the whole context.
    pub tokens: usize,
    /// Whether the embedding index was built.
    pub indexed: bool,
    /// SHA-256 of the loaded text (empty when nothing was loaded).
    pub fingerprint: String,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_has_empty_text() {
        let r = GenerationResult::failed("backend down");
        assert!(r.text.is_empty());
        assert!(!r.is_ok());
        assert_eq!(r.calls, 0);
    }

    #[test]
    fn test_result_serializes_seconds() {
        let r = GenerationResult {
            text: "ok".to_string(),
            elapsed: Duration::from_millis(1500),
            ..GenerationResult::default()
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["elapsed_secs"], 1.5);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_heading_deserializes() {
        let h: Heading = serde_json::from_str(r#"{"level": 2, "text": "Opening hours"}"#).unwrap();
        assert_eq!(h.level, 2);
        assert_eq!(h.text, "Opening hours");
    }
}
