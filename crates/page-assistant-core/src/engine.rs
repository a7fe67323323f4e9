//! The page assistant engine.
//!
//! [`PageAssistant`] owns the currently loaded page context and everything
//! derived from it (chunks, embedding index, relevance cache) and exposes
//! the boundary operations: [`load`](PageAssistant::load),
//! [`answer`](PageAssistant::answer), [`summarize`](PageAssistant::summarize)
//! and [`describe_structure`](PageAssistant::describe_structure).
//!
//! Backends are injected as trait objects, so the engine itself performs no
//! I/O beyond what its gateways do.
//!
//! # State
//!
//! All derived state lives in one `LoadedContext` value. `load()` builds
//! the replacement completely before assigning it, so a reader never sees
//! chunks from one page next to an index or cache from another.
//!
//! # Example
//!
//! ```rust
//! use anyhow::Result;
//! use page_assistant_core::engine::{EngineSettings, PageAssistant};
//! use page_assistant_core::embedding::EmbeddingGateway;
//! use page_assistant_core::generation::{GenerationGateway, GenerationRequest};
//! use page_assistant_core::tokenizer::CharTokenizer;
//!
//! struct Echo;
//! impl GenerationGateway for Echo {
//!     fn model_name(&self) -> &str { "echo" }
//!     fn generate(&self, _req: &GenerationRequest) -> Result<String> {
//!         Ok("A page about otters.".to_string())
//!     }
//! }
//!
//! struct Flat;
//! impl EmbeddingGateway for Flat {
//!     fn model_name(&self) -> &str { "flat" }
//!     fn dims(&self) -> usize { 2 }
//!     fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
//!         Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
//!     }
//! }
//!
//! let mut assistant = PageAssistant::new(
//!     Box::new(Echo),
//!     Box::new(Flat),
//!     Box::new(CharTokenizer),
//!     EngineSettings::default(),
//! );
//! let report = assistant.load("Otters are semi-aquatic mammals.");
//! assert_eq!(report.chunks, 1);
//!
//! let result = assistant.summarize();
//! assert_eq!(result.text, "A page about otters.");
//! assert_eq!(result.calls, 1);
//! ```

use std::time::Instant;

use crate::chunk::{hash_text, segment, ChunkingParams};
use crate::embedding::{EmbeddingGateway, EmbeddingIndex};
use crate::error::EngineError;
use crate::generation::{merge_stops, GenerationGateway, GenerationRequest};
use crate::models::{Chunk, GenerationResult, Heading, LoadReport, Section};
use crate::prompt::{PromptTemplates, ANSWER_STOPS, REDUCE_STOPS};
use crate::retrieval::{
    normalize_question, select_relevant, RelevanceCache, Retrieval, RetrievalParams,
    CHUNK_SEPARATOR,
};
use crate::summarize::{group_chunks, SummaryParams};
use crate::telemetry::{measure, NullSampler, ResourceSampler, Telemetry};
use crate::tokenizer::{truncate_to_tokens, Tokenizer};

/// Every tunable the engine reads, decoupled from application config.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub chunking: ChunkingParams,
    pub retrieval: RetrievalParams,
    pub summary: SummaryParams,
    pub prompts: PromptTemplates,
    /// Token budget for the joined chunks in an answer prompt.
    pub max_context_tokens: usize,
    /// Output bound for answers.
    pub answer_max_tokens: usize,
    /// Stop sequences applied to every generation call.
    pub base_stop: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkingParams::default(),
            retrieval: RetrievalParams::default(),
            summary: SummaryParams::default(),
            prompts: PromptTemplates::default(),
            max_context_tokens: 7892,
            answer_max_tokens: 300,
            base_stop: vec!["\n\n".to_string(), "<|endoftext|>".to_string()],
        }
    }
}

struct LoadedContext {
    text: String,
    fingerprint: String,
    chunks: Vec<Chunk>,
    index: Option<EmbeddingIndex>,
    relevance: RelevanceCache,
}

/// Context retrieval and summarization over one loaded page.
pub struct PageAssistant {
    generator: Box<dyn GenerationGateway>,
    embedder: Box<dyn EmbeddingGateway>,
    tokenizer: Box<dyn Tokenizer>,
    sampler: Box<dyn ResourceSampler>,
    settings: EngineSettings,
    loaded: Option<LoadedContext>,
}

impl PageAssistant {
    pub fn new(
        generator: Box<dyn GenerationGateway>,
        embedder: Box<dyn EmbeddingGateway>,
        tokenizer: Box<dyn Tokenizer>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            generator,
            embedder,
            tokenizer,
            sampler: Box::new(NullSampler),
            settings,
            loaded: None,
        }
    }

    /// Replace the resource sampler (defaults to [`NullSampler`]).
    pub fn with_sampler(mut self, sampler: Box<dyn ResourceSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    // ============ Context lifecycle ============

    /// Load a new page context, discarding all state derived from the
    /// previous one.
    ///
    /// Segments the text and embeds every chunk in one batch. An embedding
    /// failure leaves the context loaded without an index: summaries still
    /// work, retrieval reports [`EngineError::IndexUnavailable`].
    ///
    /// Blank input clears the engine.
    pub fn load(&mut self, context: &str) -> LoadReport {
        let start = Instant::now();

        if context.trim().is_empty() {
            tracing::warn!("empty context, clearing loaded state");
            self.clear();
            return LoadReport {
                elapsed: start.elapsed(),
                ..LoadReport::default()
            };
        }

        let tokens = match self.tokenizer.count(context) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("token count failed: {:#}", e);
                0
            }
        };
        let chunks = segment(
            self.tokenizer.as_ref(),
            context,
            None,
            &self.settings.chunking,
        );

        let index = match EmbeddingIndex::build(self.embedder.as_ref(), &chunks) {
            Ok(index) => Some(index),
            Err(e) => {
                tracing::warn!(
                    model = self.embedder.model_name(),
                    "embedding index unavailable: {:#}",
                    e
                );
                None
            }
        };

        let fingerprint = hash_text(context);
        let report = LoadReport {
            chunks: chunks.len(),
            tokens,
            indexed: index.is_some(),
            fingerprint: fingerprint.clone(),
            elapsed: start.elapsed(),
        };

        self.loaded = Some(LoadedContext {
            text: context.to_string(),
            fingerprint,
            chunks,
            index,
            relevance: RelevanceCache::default(),
        });

        tracing::info!(
            chunks = report.chunks,
            tokens = report.tokens,
            indexed = report.indexed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "context loaded"
        );
        report
    }

    /// Drop the loaded context and everything derived from it.
    pub fn clear(&mut self) {
        if self.loaded.take().is_some() {
            tracing::debug!("context cleared");
        }
    }

    // ============ Retrieval ============

    /// Select the chunks relevant to `question`.
    ///
    /// Repeated questions (after trimming and lower-casing) are answered
    /// from the relevance cache without touching the embedding backend.
    /// Failed lookups are never cached.
    pub fn retrieve(&mut self, question: &str) -> Result<Retrieval, EngineError> {
        let loaded = self.loaded.as_mut().ok_or(EngineError::ContextNotLoaded)?;
        let key = normalize_question(question);

        if let Some(hit) = loaded.relevance.get(&key) {
            tracing::debug!(question = %key, fallback = hit.fallback, "relevance cache hit");
            return Ok(Retrieval {
                indices: hit.indices.clone(),
                chunks: texts_at(&loaded.chunks, &hit.indices),
                cached: true,
                fallback: hit.fallback,
            });
        }

        let index = loaded
            .index
            .as_ref()
            .filter(|i| !i.is_empty())
            .ok_or(EngineError::IndexUnavailable)?;
        if index.len() != loaded.chunks.len() {
            return Err(EngineError::IndexMismatch {
                expected: loaded.chunks.len(),
                got: index.len(),
            });
        }

        let query = self
            .embedder
            .embed(question.trim())
            .map_err(|e| EngineError::Embedding(format!("{:#}", e)))?;
        if query.len() != index.dims() {
            return Err(EngineError::DimensionMismatch {
                expected: index.dims(),
                got: query.len(),
            });
        }

        let similarities = index.similarities(&query);
        let selection = select_relevant(&similarities, &self.settings.retrieval);
        if selection.fallback {
            tracing::warn!(
                best_score = selection.best_score,
                threshold = selection.threshold,
                "no chunk passed the relevance threshold, using the best match"
            );
        }
        tracing::debug!(
            seeds = ?selection.seeds,
            indices = ?selection.indices,
            threshold = selection.threshold,
            "selected relevant chunks"
        );

        loaded
            .relevance
            .insert(key, selection.indices.clone(), selection.fallback);
        Ok(Retrieval {
            chunks: texts_at(&loaded.chunks, &selection.indices),
            indices: selection.indices,
            cached: false,
            fallback: selection.fallback,
        })
    }

    // ============ Boundary operations ============

    /// Answer `question` from the loaded context.
    ///
    /// Never fails: retrieval and backend errors are reported through
    /// [`GenerationResult::error`]. An empty completion is replaced by the
    /// configured "no information" phrase.
    pub fn answer(&mut self, question: &str) -> GenerationResult {
        let start = Instant::now();

        let retrieval = match self.retrieve(question) {
            Ok(r) => r,
            Err(e) => {
                if e.is_precondition() {
                    tracing::info!("answer skipped: {}", e);
                } else {
                    tracing::warn!("answer aborted: {}", e);
                }
                return GenerationResult {
                    elapsed: start.elapsed(),
                    ..GenerationResult::failed(e)
                };
            }
        };

        let context = truncate_to_tokens(
            self.tokenizer.as_ref(),
            &retrieval.joined(),
            self.settings.max_context_tokens,
        );
        let request = GenerationRequest::new(
            self.settings.prompts.answer(&context, question),
            self.settings.answer_max_tokens,
            merge_stops(ANSWER_STOPS, &self.settings.base_stop),
        );

        let mut telemetry = Telemetry::default();
        let outcome = self.generate_measured(&request, &mut telemetry);
        let mut result = GenerationResult {
            elapsed: start.elapsed(),
            resource_usage_mb: telemetry.peak_resource_mb,
            calls: telemetry.calls,
            degraded: retrieval.fallback,
            ..GenerationResult::default()
        };

        match outcome {
            Ok(text) if text.is_empty() => {
                result.text = self.settings.prompts.no_information.clone();
            }
            Ok(text) => result.text = text,
            Err(e) => {
                tracing::warn!("answer failed: {}", e);
                result.error = Some(e.to_string());
            }
        }

        tracing::info!(
            chunks = retrieval.indices.len(),
            cached = retrieval.cached,
            elapsed_ms = result.elapsed.as_millis() as u64,
            ok = result.is_ok(),
            "answer finished"
        );
        result
    }

    /// Summarize the whole loaded context.
    ///
    /// Chunks are packed into budgeted groups, each group is summarized
    /// separately, and several group summaries are merged by one final
    /// call. A failed group is skipped and marks the result degraded.
    pub fn summarize(&self) -> GenerationResult {
        let start = Instant::now();

        let Some(loaded) = self.loaded.as_ref() else {
            return GenerationResult {
                elapsed: start.elapsed(),
                ..GenerationResult::failed(EngineError::ContextNotLoaded)
            };
        };

        let params = &self.settings.summary;
        let prompts = &self.settings.prompts;
        let groups = group_chunks(&loaded.chunks, params.group_budget_tokens);

        let mut telemetry = Telemetry::default();
        let mut degraded = false;
        let mut summaries = Vec::with_capacity(groups.len());

        for (i, group) in groups.iter().enumerate() {
            let text = loaded.chunks[group.clone()]
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(CHUNK_SEPARATOR);
            let request = GenerationRequest::new(
                prompts.map(&text),
                params.map_max_tokens,
                self.settings.base_stop.clone(),
            );
            match self.generate_measured(&request, &mut telemetry) {
                Ok(summary) if !summary.is_empty() => {
                    tracing::debug!(group = i + 1, of = groups.len(), "group summarized");
                    summaries.push(summary);
                }
                Ok(_) => {
                    tracing::warn!(group = i + 1, "empty summary for group");
                    degraded = true;
                }
                Err(e) => {
                    tracing::warn!(group = i + 1, "group summary failed: {}", e);
                    degraded = true;
                }
            }
        }

        let mut result = GenerationResult {
            degraded,
            ..GenerationResult::default()
        };

        match summaries.len() {
            0 => result.error = Some(EngineError::NoSummaries.to_string()),
            1 => result.text = summaries.remove(0),
            _ => {
                let request = GenerationRequest::new(
                    prompts.reduce(&summaries),
                    params.reduce_max_tokens,
                    merge_stops(REDUCE_STOPS, &self.settings.base_stop),
                );
                match self.generate_measured(&request, &mut telemetry) {
                    Ok(merged) if !merged.is_empty() => result.text = merged,
                    Ok(_) => {
                        tracing::warn!("empty merged summary, returning group summaries");
                        result.degraded = true;
                        result.text = summaries.join("\n");
                    }
                    Err(e) => {
                        tracing::warn!("summary merge failed: {}", e);
                        result.error = Some(e.to_string());
                    }
                }
            }
        }

        result.elapsed = start.elapsed();
        result.resource_usage_mb = telemetry.peak_resource_mb;
        result.calls = telemetry.calls;

        tracing::info!(
            groups = groups.len(),
            calls = result.calls,
            degraded = result.degraded,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "summary finished"
        );
        result
    }

    /// Describe the page layout from its headings and landmark sections.
    ///
    /// Independent of the loaded context.
    pub fn describe_structure(
        &self,
        headings: &[Heading],
        sections: &[Section],
    ) -> GenerationResult {
        let start = Instant::now();

        if headings.is_empty() {
            return GenerationResult {
                elapsed: start.elapsed(),
                ..GenerationResult::failed(EngineError::NoHeadings)
            };
        }

        let request = GenerationRequest::new(
            self.settings.prompts.structure(headings, sections),
            self.settings.summary.structure_max_tokens,
            self.settings.base_stop.clone(),
        );
        let mut telemetry = Telemetry::default();
        let outcome = self.generate_measured(&request, &mut telemetry);

        let mut result = GenerationResult {
            elapsed: start.elapsed(),
            resource_usage_mb: telemetry.peak_resource_mb,
            calls: telemetry.calls,
            ..GenerationResult::default()
        };
        match outcome {
            Ok(text) => result.text = text,
            Err(e) => result.error = Some(e.to_string()),
        }
        result
    }

    // ============ Accessors ============

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Chunks of the loaded context (empty when nothing is loaded).
    pub fn chunks(&self) -> &[Chunk] {
        self.loaded
            .as_ref()
            .map(|l| l.chunks.as_slice())
            .unwrap_or_default()
    }

    pub fn context(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.text.as_str())
    }

    /// SHA-256 of the loaded text.
    pub fn fingerprint(&self) -> Option<&str> {
        self.loaded.as_ref().map(|l| l.fingerprint.as_str())
    }

    pub fn index(&self) -> Option<&EmbeddingIndex> {
        self.loaded.as_ref().and_then(|l| l.index.as_ref())
    }

    /// Normalized questions currently held in the relevance cache.
    pub fn cached_questions(&self) -> Vec<String> {
        self.loaded
            .as_ref()
            .map(|l| l.relevance.keys())
            .unwrap_or_default()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn generator_model(&self) -> &str {
        self.generator.model_name()
    }

    pub fn embedder_model(&self) -> &str {
        self.embedder.model_name()
    }

    // ============ Internals ============

    fn generate_measured(
        &self,
        request: &GenerationRequest,
        telemetry: &mut Telemetry,
    ) -> Result<String, EngineError> {
        let (outcome, measurement) =
            measure(self.sampler.as_ref(), || self.generator.generate(request));
        telemetry.record(measurement);
        tracing::debug!(
            model = self.generator.model_name(),
            max_tokens = request.max_tokens,
            elapsed_ms = measurement.elapsed.as_millis() as u64,
            resource_mb = measurement.resource_mb,
            "generation call"
        );
        outcome
            .map(|text| text.trim().to_string())
            .map_err(|e| EngineError::Generation(format!("{:#}", e)))
    }
}

fn texts_at(chunks: &[Chunk], indices: &[usize]) -> Vec<String> {
    indices
        .iter()
        .filter_map(|&i| chunks.get(i))
        .map(|c| c.text.clone())
        .collect()
}
