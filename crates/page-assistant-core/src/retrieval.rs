//! Relevant-chunk selection for question answering.
//!
//! Given one similarity score per chunk, picks the chunks worth putting in
//! front of the generation backend. The selection is purely a function of
//! the scores and [`RetrievalParams`]; the engine owns the embedding call
//! and the per-context [`RelevanceCache`].
//!
//! # Selection Algorithm
//!
//! 1. Rank chunks by similarity (desc, ties by index asc); keep the top
//!    `k = min(top_k, chunk_count)`.
//! 2. Threshold: `max(threshold_floor, best × threshold_ratio)`.
//! 3. Keep the top-k chunks scoring at or above the threshold.
//! 4. If none survive, fall back to the single best chunk.
//! 5. Expand every survivor `i` to `i − before .. i + after + 1`, clipped
//!    to the chunk range, then de-duplicate and sort ascending.
//!
//! # Example
//!
//! ```rust
//! use page_assistant_core::retrieval::{select_relevant, RetrievalParams};
//!
//! let params = RetrievalParams { top_k: 3, ..RetrievalParams::default() };
//! let sel = select_relevant(&[0.9, 0.3, 0.2], &params);
//! assert_eq!(sel.seeds, vec![0]);
//! assert_eq!(sel.indices, vec![0, 1]);
//! ```

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Separator placed between chunk texts when building a prompt context.
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Candidates considered before thresholding.
    pub top_k: usize,
    /// Lowest threshold ever applied.
    pub threshold_floor: f32,
    /// Fraction of the best score a candidate must reach.
    pub threshold_ratio: f32,
    /// Neighbors added before each selected chunk.
    pub neighbors_before: usize,
    /// Neighbors added after each selected chunk.
    pub neighbors_after: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 6,
            threshold_floor: 0.1,
            threshold_ratio: 0.75,
            neighbors_before: 2,
            neighbors_after: 1,
        }
    }
}

/// Outcome of [`select_relevant`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    /// Chunks that passed the threshold (or the fallback chunk), ascending.
    pub seeds: Vec<usize>,
    /// Seeds plus neighbors, ascending and de-duplicated.
    pub indices: Vec<usize>,
    /// True when no candidate passed the threshold.
    pub fallback: bool,
    pub best_score: f32,
    pub threshold: f32,
}

/// Select relevant chunk indices from per-chunk similarity scores.
///
/// Returns an empty selection only for an empty score slice.
pub fn select_relevant(similarities: &[f32], params: &RetrievalParams) -> Selection {
    if similarities.is_empty() {
        return Selection::default();
    }

    let score = |i: usize| {
        let s = similarities[i];
        if s.is_nan() {
            f32::NEG_INFINITY
        } else {
            s
        }
    };

    let mut ranked: Vec<usize> = (0..similarities.len()).collect();
    ranked.sort_by(|&a, &b| score(b).total_cmp(&score(a)).then(a.cmp(&b)));

    let best = ranked[0];
    let best_score = score(best);
    let threshold = params
        .threshold_floor
        .max(best_score * params.threshold_ratio);

    let k = params.top_k.max(1).min(ranked.len());
    let mut seeds: Vec<usize> = ranked[..k]
        .iter()
        .copied()
        .filter(|&i| score(i) >= threshold)
        .collect();

    let fallback = seeds.is_empty();
    if fallback {
        seeds.push(best);
    }
    seeds.sort_unstable();

    let indices = expand_neighbors(
        &seeds,
        similarities.len(),
        params.neighbors_before,
        params.neighbors_after,
    );

    Selection {
        seeds,
        indices,
        fallback,
        best_score,
        threshold,
    }
}

/// Expand each seed to its neighborhood, clipped to `0..len`.
pub fn expand_neighbors(seeds: &[usize], len: usize, before: usize, after: usize) -> Vec<usize> {
    let mut out = BTreeSet::new();
    for &i in seeds {
        let lo = i.saturating_sub(before);
        let hi = i.saturating_add(after).saturating_add(1).min(len);
        out.extend(lo..hi);
    }
    out.into_iter().collect()
}

/// Cache key for a question: trimmed and lower-cased.
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

/// A remembered selection: the chunk indices and whether they came from
/// the best-match fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSelection {
    pub indices: Vec<usize>,
    pub fallback: bool,
}

/// Normalized question → cached selection, valid for one loaded context.
#[derive(Debug, Clone, Default)]
pub struct RelevanceCache {
    entries: HashMap<String, CachedSelection>,
}

impl RelevanceCache {
    pub fn get(&self, key: &str) -> Option<&CachedSelection> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, indices: Vec<usize>, fallback: bool) {
        self.entries
            .insert(key, CachedSelection { indices, fallback });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Chunks selected for one question, in document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Retrieval {
    pub indices: Vec<usize>,
    pub chunks: Vec<String>,
    /// Served from the relevance cache without an embedding call.
    pub cached: bool,
    /// No chunk passed the threshold; the best single chunk was used.
    pub fallback: bool,
}

impl Retrieval {
    /// Chunk texts joined with [`CHUNK_SEPARATOR`].
    pub fn joined(&self) -> String {
        self.chunks.join(CHUNK_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RetrievalParams {
        RetrievalParams::default()
    }

    #[test]
    fn test_empty_scores() {
        let sel = select_relevant(&[], &params());
        assert!(sel.indices.is_empty());
        assert!(!sel.fallback);
    }

    #[test]
    fn test_reference_example() {
        let p = RetrievalParams {
            top_k: 3,
            ..params()
        };
        let sel = select_relevant(&[0.9, 0.3, 0.2], &p);
        assert!((sel.threshold - 0.675).abs() < 1e-6);
        assert_eq!(sel.seeds, vec![0]);
        assert_eq!(sel.indices, vec![0, 1]);
        assert!(!sel.fallback);
    }

    #[test]
    fn test_threshold_floor_applies() {
        // best × ratio = 0.06 < floor 0.1
        let sel = select_relevant(&[0.08, 0.05, 0.11], &params());
        assert!((sel.threshold - 0.1).abs() < 1e-6);
        assert_eq!(sel.seeds, vec![2]);
        assert!(!sel.fallback);
    }

    #[test]
    fn test_all_below_threshold_falls_back_to_best() {
        let p = RetrievalParams {
            neighbors_before: 0,
            neighbors_after: 0,
            ..params()
        };
        let sel = select_relevant(&[0.02, 0.05, -0.3, 0.01], &p);
        assert!(sel.fallback);
        assert_eq!(sel.seeds, vec![1]);
        assert_eq!(sel.indices, vec![1]);
    }

    #[test]
    fn test_top_k_limits_candidates() {
        let p = RetrievalParams {
            top_k: 2,
            neighbors_before: 0,
            neighbors_after: 0,
            ..params()
        };
        let sel = select_relevant(&[0.80, 0.79, 0.78, 0.77], &p);
        assert_eq!(sel.seeds, vec![0, 1]);
    }

    #[test]
    fn test_ties_prefer_lower_index() {
        let p = RetrievalParams {
            top_k: 1,
            neighbors_before: 0,
            neighbors_after: 0,
            ..params()
        };
        let sel = select_relevant(&[0.5, 0.5, 0.5], &p);
        assert_eq!(sel.seeds, vec![0]);
    }

    #[test]
    fn test_nan_scores_rank_last() {
        let p = RetrievalParams {
            neighbors_before: 0,
            neighbors_after: 0,
            ..params()
        };
        let sel = select_relevant(&[f32::NAN, 0.4], &p);
        assert_eq!(sel.seeds, vec![1]);
    }

    #[test]
    fn test_neighbor_expansion_in_middle() {
        assert_eq!(expand_neighbors(&[5], 10, 2, 1), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_neighbor_expansion_clipped() {
        assert_eq!(expand_neighbors(&[0], 10, 2, 1), vec![0, 1]);
        assert_eq!(expand_neighbors(&[9], 10, 2, 1), vec![7, 8, 9]);
    }

    #[test]
    fn test_neighbor_expansion_merges_overlaps() {
        assert_eq!(expand_neighbors(&[2, 4], 10, 2, 1), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_normalize_question() {
        assert_eq!(normalize_question("  What Time Is It?\n"), "what time is it?");
    }

    #[test]
    fn test_cache_roundtrip_and_clear() {
        let mut cache = RelevanceCache::default();
        cache.insert("q".to_string(), vec![1, 2], true);
        let hit = cache.get("q").unwrap();
        assert_eq!(hit.indices, vec![1, 2]);
        assert!(hit.fallback);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("q").is_none());
    }

    #[test]
    fn test_joined_uses_paragraph_separator() {
        let r = Retrieval {
            indices: vec![0, 1],
            chunks: vec!["a".to_string(), "b".to_string()],
            cached: false,
            fallback: false,
        };
        assert_eq!(r.joined(), "a\n\nb");
    }
}
