//! Tokenizer abstraction used for windowing and budget estimation.
//!
//! The engine never feeds tokens to a backend; it only needs to count
//! them and to cut text at token boundaries. Concrete BPE tokenizers live
//! in the application crate; [`CharTokenizer`] is the dependency-free
//! default and the one used by tests.

use anyhow::Result;

/// Encodes text into opaque token ids and back.
pub trait Tokenizer: Send + Sync {
    /// Returns the tokenizer identifier (e.g. `"chars"`, `"cl100k"`).
    fn name(&self) -> &str;

    fn encode(&self, text: &str) -> Result<Vec<usize>>;

    fn decode(&self, tokens: &[usize]) -> Result<String>;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.len())
    }
}

/// One token per Unicode scalar value.
///
/// Over-counts relative to a real BPE vocabulary by roughly 4×, which keeps
/// budgets conservative. Encoding round-trips exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn name(&self) -> &str {
        "chars"
    }

    fn encode(&self, text: &str) -> Result<Vec<usize>> {
        Ok(text.chars().map(|c| c as usize).collect())
    }

    fn decode(&self, tokens: &[usize]) -> Result<String> {
        tokens
            .iter()
            .map(|&t| {
                u32::try_from(t)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| anyhow::anyhow!("invalid char token: {}", t))
            })
            .collect()
    }

    fn count(&self, text: &str) -> Result<usize> {
        Ok(text.chars().count())
    }
}

/// Truncate `text` to at most `max_tokens` tokens.
///
/// Falls back to a character cut of `max_tokens × 4` when the tokenizer
/// fails, so a prompt is always bounded.
pub fn truncate_to_tokens(tokenizer: &dyn Tokenizer, text: &str, max_tokens: usize) -> String {
    match tokenizer.encode(text) {
        Ok(tokens) if tokens.len() <= max_tokens => text.to_string(),
        Ok(tokens) => match tokenizer.decode(&tokens[..max_tokens]) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("token truncation failed, cutting by characters: {:#}", e);
                prefix_chars(text, max_tokens.saturating_mul(4))
            }
        },
        Err(e) => {
            tracing::warn!("token truncation failed, cutting by characters: {:#}", e);
            prefix_chars(text, max_tokens.saturating_mul(4))
        }
    }
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn prefix_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_roundtrip_multibyte() {
        let t = CharTokenizer;
        let text = "Zażółć gęślą jaźń";
        let tokens = t.encode(text).unwrap();
        assert_eq!(tokens.len(), text.chars().count());
        assert_eq!(t.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn test_decode_rejects_surrogate() {
        let t = CharTokenizer;
        assert!(t.decode(&[0xD800]).is_err());
    }

    #[test]
    fn test_truncate_keeps_short_text() {
        assert_eq!(truncate_to_tokens(&CharTokenizer, "short", 10), "short");
    }

    #[test]
    fn test_truncate_cuts_long_text() {
        assert_eq!(truncate_to_tokens(&CharTokenizer, "abcdefgh", 3), "abc");
    }

    #[test]
    fn test_prefix_chars_on_boundary() {
        assert_eq!(prefix_chars("ąęó", 2), "ąę");
    }
}
