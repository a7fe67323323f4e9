//! Engine error taxonomy.

use thiserror::Error;

/// Failures surfaced by [`PageAssistant`](crate::engine::PageAssistant).
///
/// Boundary operations never return this directly; it is rendered into
/// [`GenerationResult::error`](crate::models::GenerationResult::error).
/// [`retrieve`](crate::engine::PageAssistant::retrieve) returns it as is.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("no context loaded")]
    ContextNotLoaded,

    #[error("embedding index unavailable for the loaded context")]
    IndexUnavailable,

    #[error("no headings to describe")]
    NoHeadings,

    #[error("embedding backend failed: {0}")]
    Embedding(String),

    #[error("generation backend failed: {0}")]
    Generation(String),

    #[error("embedding index has {got} vectors for {expected} chunks")]
    IndexMismatch { expected: usize, got: usize },

    #[error("query vector has {got} dimensions, index has {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("no group summaries were produced")]
    NoSummaries,
}

impl EngineError {
    /// Missing inputs, as opposed to a backend failure.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::ContextNotLoaded | Self::IndexUnavailable | Self::NoHeadings
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(EngineError::ContextNotLoaded.to_string(), "no context loaded");
        assert_eq!(
            EngineError::DimensionMismatch {
                expected: 256,
                got: 3
            }
            .to_string(),
            "query vector has 3 dimensions, index has 256"
        );
    }

    #[test]
    fn test_precondition_classification() {
        assert!(EngineError::IndexUnavailable.is_precondition());
        assert!(!EngineError::Embedding("timeout".into()).is_precondition());
    }
}
