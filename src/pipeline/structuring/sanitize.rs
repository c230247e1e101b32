// Clean patient-supplied text before it is placed inside a model prompt.

/// Maximum characters kept from a single utterance.
pub const MAX_UTTERANCE_CHARS: usize = 4_000;

/// Remove invisible and control characters, collapse runs of blank lines and
/// cap the length. Ordinary whitespace is preserved.
pub fn sanitize_for_prompt(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !is_invisible(*c)).collect();
    let collapsed = collapse_blank_lines(&cleaned);
    truncate_chars(collapsed.trim(), MAX_UTTERANCE_CHARS)
}

fn is_invisible(c: char) -> bool {
    if matches!(c, ' ' | '\n' | '\t') {
        return false;
    }
    matches!(
        c,
        '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
    ) || c.is_control()
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

/// Truncate on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
