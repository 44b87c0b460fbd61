//! Render deduplicated hits into the text block handed to the model.

use eventfeed_shared::RawHit;

/// Separator between hit blocks.
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Render hits as numbered blocks, truncating each snippet to `snippet_budget`
/// characters. Empty input gives an empty string.
pub fn assemble_context(hits: &[RawHit], snippet_budget: usize) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[#{}]\nTitle: {}\nLink: {}\nSnippet: {}",
                i + 1,
                hit.title,
                hit.link,
                truncate_chars(&hit.snippet, snippet_budget)
            )
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Truncate to at most `max_chars` characters, appending `…` if cut.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}…", &text[..byte_idx]),
        None => text.to_string(),
    }
}
