//! Chunk grouping for map-reduce summarization.
//!
//! Consecutive chunks are packed into groups whose combined token count
//! stays within the per-call budget, so each group can be summarized in a
//! single generation call.

use std::ops::Range;

use crate::models::Chunk;

/// Output bounds for the summarizer's generation calls.
#[derive(Debug, Clone)]
pub struct SummaryParams {
    /// Token budget for one group of chunks.
    pub group_budget_tokens: usize,
    /// Output bound for each per-group summary.
    pub map_max_tokens: usize,
    /// Output bound for the merging call.
    pub reduce_max_tokens: usize,
    /// Output bound for structure descriptions.
    pub structure_max_tokens: usize,
}

impl Default for SummaryParams {
    fn default() -> Self {
        Self {
            group_budget_tokens: 7500,
            map_max_tokens: 200,
            reduce_max_tokens: 250,
            structure_max_tokens: 250,
        }
    }
}

/// Pack chunks, in order, into ranges whose token totals are `<= budget`.
///
/// A chunk that alone exceeds the budget forms its own group.
pub fn group_chunks(chunks: &[Chunk], budget: usize) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0usize;
    let mut used = 0usize;

    for (i, chunk) in chunks.iter().enumerate() {
        if i > start && used + chunk.token_count > budget {
            groups.push(start..i);
            start = i;
            used = 0;
        }
        used += chunk.token_count;
    }
    if start < chunks.len() {
        groups.push(start..chunks.len());
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(sizes: &[usize]) -> Vec<Chunk> {
        sizes
            .iter()
            .enumerate()
            .map(|(index, &token_count)| Chunk {
                index,
                text: "x".repeat(token_count),
                token_start: 0,
                token_count,
                hash: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_empty() {
        assert!(group_chunks(&[], 100).is_empty());
    }

    #[test]
    fn test_exact_budget_not_split() {
        assert_eq!(group_chunks(&chunks(&[40, 60]), 100), vec![0..2]);
    }

    #[test]
    fn test_overflow_starts_new_group() {
        assert_eq!(
            group_chunks(&chunks(&[40, 60, 1, 99, 50]), 100),
            vec![0..2, 2..4, 4..5]
        );
    }

    #[test]
    fn test_oversized_chunk_alone() {
        assert_eq!(group_chunks(&chunks(&[30, 150, 30]), 100), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_groups_cover_all_chunks_within_budget() {
        let sizes = [17, 33, 80, 5, 5, 5, 90, 12, 64, 64, 1];
        let cs = chunks(&sizes);
        let groups = group_chunks(&cs, 100);
        let mut next = 0;
        for g in &groups {
            assert_eq!(g.start, next);
            next = g.end;
            let total: usize = cs[g.clone()].iter().map(|c| c.token_count).sum();
            assert!(total <= 100);
        }
        assert_eq!(next, cs.len());
    }
}
