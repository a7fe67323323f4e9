//! # Page Assistant Core
//!
//! Pure engine logic for Page Assistant: segmentation, the per-page
//! embedding index, relevant-chunk retrieval, hierarchical summarization,
//! telemetry accounting, and the gateway traits the engine is driven
//! through.
//!
//! This crate performs no network, process, or filesystem I/O. Concrete
//! backends (HTTP generation and embedding, BPE tokenizers, GPU memory
//! sampling) live in the `page-assistant` application crate.

pub mod chunk;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod summarize;
pub mod telemetry;
pub mod tokenizer;

pub use engine::{EngineSettings, PageAssistant};
pub use error::EngineError;
pub use models::{Chunk, GenerationResult, Heading, LoadReport, Section};
