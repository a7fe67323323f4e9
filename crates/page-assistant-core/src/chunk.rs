//! Sliding-window text segmenter.
//!
//! Splits the loaded context into overlapping, token-bounded [`Chunk`]s so
//! that any single chunk (and any budgeted group of chunks) fits the
//! generation backend's input window.
//!
//! Each chunk carries its token offset and a SHA-256 hash of its text, so
//! two loads of identical content produce identical chunk sequences.
//!
//! # Algorithm
//!
//! 1. Encode the whole text with the configured [`Tokenizer`].
//! 2. Pick the window size `W`: the caller's value, or
//!    `max(min_window, min(max_window, N / divisor))`.
//! 3. Emit windows `tokens[s .. s + W]` with stride `W − overlap`, stopping
//!    as soon as a window reaches the end of the sequence.
//! 4. Decode each window; windows that decode to whitespace are skipped.
//!
//! With `N > W` this yields `ceil((N − overlap) / (W − overlap))` chunks.
//!
//! # Example
//!
//! ```rust
//! use page_assistant_core::chunk::{segment, ChunkingParams};
//! use page_assistant_core::tokenizer::CharTokenizer;
//!
//! let params = ChunkingParams { overlap_tokens: 2, ..ChunkingParams::default() };
//! let chunks = segment(&CharTokenizer, "abcdefghij", Some(6), &params);
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].text, "abcdef");
//! assert_eq!(chunks[1].text, "efghij");
//! ```

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::models::Chunk;
use crate::tokenizer::{prefix_chars, Tokenizer};

/// Approximate characters-per-token ratio, used only when the tokenizer
/// itself is unavailable.
const CHARS_PER_TOKEN: usize = 4;

/// Window sizing parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct ChunkingParams {
    /// Upper bound for the automatically chosen window.
    pub max_window_tokens: usize,
    /// Lower bound for the automatically chosen window.
    pub min_window_tokens: usize,
    /// Tokens shared by consecutive windows.
    pub overlap_tokens: usize,
    /// `N / divisor` is the preferred window for an `N`-token text.
    pub window_divisor: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            max_window_tokens: 7000,
            min_window_tokens: 500,
            overlap_tokens: 100,
            window_divisor: 4,
        }
    }
}

/// Window size for a text of `total_tokens` tokens when the caller does
/// not specify one.
pub fn default_window(total_tokens: usize, params: &ChunkingParams) -> usize {
    (total_tokens / params.window_divisor.max(1))
        .min(params.max_window_tokens)
        .max(params.min_window_tokens)
}

/// Split `text` into overlapping token windows.
///
/// Returns an empty vector for empty input. Never fails: if the tokenizer
/// errors, the failure is logged and a single chunk holding a safe-length
/// prefix of the text is returned instead.
pub fn segment(
    tokenizer: &dyn Tokenizer,
    text: &str,
    window: Option<usize>,
    params: &ChunkingParams,
) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    match split_windows(tokenizer, text, window, params) {
        Ok(chunks) => {
            tracing::debug!(
                chunks = chunks.len(),
                tokenizer = tokenizer.name(),
                "segmented context"
            );
            chunks
        }
        Err(e) => {
            tracing::warn!("tokenization failed, falling back to a text prefix: {:#}", e);
            let max_chars = window.unwrap_or(params.min_window_tokens) * CHARS_PER_TOKEN;
            let prefix = prefix_chars(text, max_chars);
            let approx_tokens = prefix.chars().count().div_ceil(CHARS_PER_TOKEN);
            vec![make_chunk(0, prefix, 0, approx_tokens)]
        }
    }
}

fn split_windows(
    tokenizer: &dyn Tokenizer,
    text: &str,
    window: Option<usize>,
    params: &ChunkingParams,
) -> Result<Vec<Chunk>> {
    let tokens = tokenizer.encode(text)?;
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let window = window
        .unwrap_or_else(|| default_window(tokens.len(), params))
        .max(1);
    // An overlap as large as the window would never advance.
    let stride = if params.overlap_tokens < window {
        window - params.overlap_tokens
    } else {
        window
    };

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + window).min(tokens.len());
        let piece = tokenizer.decode(&tokens[start..end])?;
        if piece.trim().is_empty() {
            tracing::debug!(start, end, "skipping whitespace-only window");
        } else {
            chunks.push(make_chunk(chunks.len(), piece, start, end - start));
        }
        if end >= tokens.len() {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

fn make_chunk(index: usize, text: String, token_start: usize, token_count: usize) -> Chunk {
    Chunk {
        index,
        hash: hash_text(&text),
        text,
        token_start,
        token_count,
    }
}

/// Hex-encoded SHA-256 of `text`.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
