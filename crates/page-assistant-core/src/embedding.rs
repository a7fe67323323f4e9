//! Embedding gateway trait, vector utilities and the per-context index.
//!
//! Defines the [`EmbeddingGateway`] trait that all embedding backends
//! implement, the [`cosine_similarity`] helper, and [`EmbeddingIndex`]:
//! one vector per chunk, positionally aligned, built in a single batch.
//!
//! Concrete gateways (Ollama, OpenAI, fastembed, feature hashing) live in
//! the `page-assistant` app crate.

use anyhow::Result;

use crate::models::Chunk;

/// Text → fixed-length vector.
///
/// Implementations must return vectors of the same dimensionality for the
/// lifetime of the instance.
pub trait EmbeddingGateway: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different
/// lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Per-chunk vectors for the loaded context.
///
/// Either every chunk has a vector or the index does not exist: a failed
/// or inconsistent batch never produces a partial index.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingIndex {
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingIndex {
    /// Embed all chunks in one batched call.
    ///
    /// An empty chunk set yields an empty index without calling the gateway.
    ///
    /// # Errors
    ///
    /// Fails if the gateway fails, returns a different number of vectors
    /// than chunks, or returns vectors of differing dimensionality.
    pub fn build(gateway: &dyn EmbeddingGateway, chunks: &[Chunk]) -> Result<Self> {
        if chunks.is_empty() {
            return Ok(Self::default());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = gateway.embed_batch(&texts)?;

        if vectors.len() != chunks.len() {
            anyhow::bail!(
                "embedding count mismatch: expected {}, got {}",
                chunks.len(),
                vectors.len()
            );
        }
        let dims = vectors[0].len();
        if dims == 0 {
            anyhow::bail!("embedding backend returned empty vectors");
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            anyhow::bail!(
                "inconsistent embedding dimensionality: expected {}, got {}",
                dims,
                bad.len()
            );
        }

        Ok(Self { vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Dimensionality of the stored vectors (0 for an empty index).
    pub fn dims(&self) -> usize {
        self.vectors.first().map_or(0, Vec::len)
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// Cosine similarity of `query` against every chunk, in chunk order.
    pub fn similarities(&self, query: &[f32]) -> Vec<f32> {
        self.vectors
            .iter()
            .map(|v| cosine_similarity(query, v))
            .collect()
    }
}

impl Default for EmbeddingIndex {
    fn default() -> Self {
        Self {
            vectors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGateway {
        vectors: Vec<Vec<f32>>,
        calls: AtomicUsize,
    }

    impl FixedGateway {
        fn new(vectors: Vec<Vec<f32>>) -> Self {
            Self {
                vectors,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EmbeddingGateway for FixedGateway {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            self.vectors.first().map_or(0, Vec::len)
        }
        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vectors.iter().take(texts.len()).cloned().collect())
        }
    }

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.to_string(),
            token_start: 0,
            token_count: text.len(),
            hash: String::new(),
        }
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_build_empty_skips_gateway() {
        let gw = FixedGateway::new(vec![vec![1.0]]);
        let index = EmbeddingIndex::build(&gw, &[]).unwrap();
        assert!(index.is_empty());
        assert_eq!(gw.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_build_single_batch() {
        let gw = FixedGateway::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let chunks = vec![chunk(0, "a"), chunk(1, "b")];
        let index = EmbeddingIndex::build(&gw, &chunks).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dims(), 2);
        assert_eq!(gw.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_build_rejects_short_batch() {
        let gw = FixedGateway::new(vec![vec![1.0, 0.0]]);
        let chunks = vec![chunk(0, "a"), chunk(1, "b")];
        assert!(EmbeddingIndex::build(&gw, &chunks).is_err());
    }

    #[test]
    fn test_build_rejects_mixed_dims() {
        let gw = FixedGateway::new(vec![vec![1.0, 0.0], vec![1.0]]);
        let chunks = vec![chunk(0, "a"), chunk(1, "b")];
        assert!(EmbeddingIndex::build(&gw, &chunks).is_err());
    }

    #[test]
    fn test_similarities_in_chunk_order() {
        let gw = FixedGateway::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let chunks = vec![chunk(0, "a"), chunk(1, "b")];
        let index = EmbeddingIndex::build(&gw, &chunks).unwrap();
        let sims = index.similarities(&[0.0, 1.0]);
        assert!(sims[0].abs() < 1e-6);
        assert!((sims[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_default_embed_uses_batch() {
        let gw = FixedGateway::new(vec![vec![0.5, 0.5]]);
        assert_eq!(gw.embed("q").unwrap(), vec![0.5, 0.5]);
    }
}
