use super::StructuringError;

/// Strip a surrounding markdown code fence (```` ``` ```` or ```` ```json ````)
/// if present. Text outside a leading fence is left untouched.
pub fn strip_json_fences(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse model output into a JSON value. Shape is checked separately.
pub fn parse_note_response(raw: &str) -> Result<serde_json::Value, StructuringError> {
    let body = strip_json_fences(raw);
    if body.is_empty() {
        return Err(StructuringError::MalformedResponse("empty response".into()));
    }
    serde_json::from_str(body).map_err(|e| StructuringError::MalformedResponse(e.to_string()))
}
