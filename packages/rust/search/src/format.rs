//! Rendering of search hits into prompt context and citation lists.
//!
//! Both renderings keep the order the service returned hits in, so the n-th
//! citation always describes the n-th context block.

use controlqa_shared::SearchHit;

/// Separator line between context blocks.
const CONTEXT_DELIMITER: &str = "\n=================\n";

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render hits as labeled `FILE:` / `CONTENT:` blocks for the system prompt.
pub fn format_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("FILE: {}\nCONTENT: {}", hit.title, hit.content))
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

/// Render hits as a bullet list of titles with their relevance scores.
pub fn format_sources(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("- {} (Score: {:.2})", hit.title, hit.score))
        .collect::<Vec<_>>()
        .join("\n")
}
