use std::sync::LazyLock;

use regex::Regex;

use super::context::chunk_label;
use super::types::AssembledContext;

/// Chunk references the answer makes, as context labels.
///
/// Accepts `[chunk 2]`, `[chunk 2 | structured-field]` and lists such as
/// `[chunk 1, chunk 3]` or `[chunks 1 and 3]`. Labels not present in the
/// context are dropped; order is first mention, without duplicates.
pub fn extract_cited_labels(answer: &str, context: &AssembledContext) -> Vec<String> {
    static BRACKET: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\[\s*chunks?\s*\d[^\]]*\]").expect("citation pattern is valid")
    });
    static NUMBER: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)(?:chunks?\s*|,\s*|and\s+)(\d+)").expect("number pattern is valid"));

    let mut cited: Vec<String> = Vec::new();
    for bracket in BRACKET.find_iter(answer) {
        // Source tags after `|` never carry numbers we want.
        let head = bracket.as_str().split('|').next().unwrap_or_default();
        for cap in NUMBER.captures_iter(head) {
            let Some(n) = cap.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) else {
                continue;
            };
            let label = chunk_label(n);
            if context.labels.contains(&label) && !cited.contains(&label) {
                cited.push(label);
            }
        }
    }
    cited
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(n: usize) -> AssembledContext {
        AssembledContext {
            text: String::new(),
            chunks_included: vec![],
            labels: (1..=n).map(chunk_label).collect(),
        }
    }

    #[test]
    fn extracts_single_references_in_mention_order() {
        let cited = extract_cited_labels(
            "The patient reports a headache [chunk 2] since Monday [chunk 1].",
            &context(3),
        );
        assert_eq!(cited, vec!["chunk 2", "chunk 1"]);
    }

    #[test]
    fn handles_lists_and_source_tags() {
        let ctx = context(4);
        assert_eq!(
            extract_cited_labels("Yes [chunk 1, chunk 3].", &ctx),
            vec!["chunk 1", "chunk 3"]
        );
        assert_eq!(
            extract_cited_labels("Yes [chunks 2 and 4].", &ctx),
            vec!["chunk 2", "chunk 4"]
        );
        assert_eq!(
            extract_cited_labels("Yes [chunk 2 | structured-field].", &ctx),
            vec!["chunk 2"]
        );
    }

    #[test]
    fn drops_labels_outside_the_context_and_duplicates() {
        let cited = extract_cited_labels("[chunk 1] [chunk 9] [Chunk 1]", &context(2));
        assert_eq!(cited, vec!["chunk 1"]);
    }

    #[test]
    fn no_references_yield_nothing() {
        assert!(extract_cited_labels("No idea.", &context(2)).is_empty());
    }
}
