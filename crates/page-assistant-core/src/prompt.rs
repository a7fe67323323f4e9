//! Prompt builders and stop sequences for the engine's generation calls.

use crate::models::{Heading, Section};

/// Stop sequences for answer synthesis.
pub const ANSWER_STOPS: &[&str] = &[
    "\nQuestion:",
    "Question:",
    "\n###",
    "###",
    "\nAnswer:",
    "<|endoftext|>",
    "\n---",
];

/// Stop sequences for the summary-merging call.
pub const REDUCE_STOPS: &[&str] = &["\n\n", "###", "<|endoftext|>", "Summary:"];

/// Prompt texts parameterized by output language and the sentinel reply.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    /// Language the backend is asked to answer in.
    pub language: String,
    /// Exact reply for questions the context cannot answer.
    pub no_information: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
            no_information: "No information".to_string(),
        }
    }
}

impl PromptTemplates {
    pub fn answer(&self, context: &str, question: &str) -> String {
        format!(
            "Answer only the question below, in {lang}, using only the fragments provided.\n\
             If the fragments do not contain enough information, reply with exactly '{none}'.\n\
             Do not use outside knowledge.\n\
             Format: ONLY the answer text, nothing else.\n\n\
             Fragments:\n{context}\n\n\
             Question: {question}\n\
             Answer: ",
            lang = self.language,
            none = self.no_information,
            context = context,
            question = question.trim(),
        )
    }

    pub fn map(&self, text: &str) -> String {
        format!(
            "Write a concise summary of the text in {lang}, at most 150 words. \
             Focus on the key information.\n\nText:\n{text}\n\nSummary:",
            lang = self.language,
        )
    }

    pub fn reduce(&self, summaries: &[String]) -> String {
        format!(
            "Merge the following summaries into one coherent summary in {lang}, \
             at most 200 words:\n{joined}\n\nFinal summary:",
            lang = self.language,
            joined = summaries.join("\n"),
        )
    }

    pub fn structure(&self, headings: &[Heading], sections: &[Section]) -> String {
        let heading_list = headings
            .iter()
            .map(|h| format!("Level {}: {}", h.level, h.text))
            .collect::<Vec<_>>()
            .join("\n");
        let section_list = if sections.is_empty() {
            String::new()
        } else {
            let lines = sections
                .iter()
                .map(|s| format!("{} ({})", s.name, s.role))
                .collect::<Vec<_>>()
                .join("\n");
            format!("\nSections:\n{}", lines)
        };
        format!(
            "Describe the structure of the page in {lang} based on:\n\
             Headings:\n{heading_list}{section_list}\n\nDescription:",
            lang = self.language,
        )
    }
}
