use super::types::AssembledContext;
use crate::models::RetrievalResult;
use crate::pipeline::structuring::truncate_chars;

/// Character budget for the chunk section of a QA prompt.
pub const MAX_CONTEXT_CHARS: usize = 12_000;

/// Label the model cites for the chunk at 1-based context position `n`.
pub fn chunk_label(n: usize) -> String {
    format!("chunk {n}")
}

fn section_header(n: usize, result: &RetrievalResult) -> String {
    format!("[{} | {}]\n", chunk_label(n), result.chunk.source.as_str())
}

/// Lay out retrieved chunks in rank order until the budget is spent.
///
/// Chunks are taken as a prefix: the first one that does not fit ends the
/// context, so `chunks_included` is always the top of the ranking. A first
/// chunk larger than the whole budget has its body cut down rather than
/// being dropped. Each included chunk carries the exact body placed in the
/// context, so the evidence returned to callers is what the model saw.
pub fn assemble_context(results: &[RetrievalResult], budget: usize) -> AssembledContext {
    let mut sections: Vec<String> = Vec::new();
    let mut chunks_included = Vec::new();
    let mut labels = Vec::new();
    let mut total_chars = 0;

    for result in results {
        let n = chunks_included.len() + 1;
        let header = section_header(n, result);
        let mut body = result.chunk.text.trim().to_string();
        // Blank line between sections.
        let separator = if sections.is_empty() { 0 } else { 2 };
        let header_len = header.chars().count();
        let len = header_len + body.chars().count();

        if total_chars + separator + len > budget {
            if !sections.is_empty() || header_len >= budget {
                break;
            }
            body = truncate_chars(&body, budget - header_len).trim_end().to_string();
            if body.is_empty() {
                break;
            }
        }

        let section = format!("{header}{body}");
        total_chars += separator + section.chars().count();
        sections.push(section);

        let mut included = result.clone();
        included.chunk.text = body;
        chunks_included.push(included);
        labels.push(chunk_label(n));
    }

    AssembledContext {
        text: sections.join("\n\n"),
        chunks_included,
        labels,
    }
}
