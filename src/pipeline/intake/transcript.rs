use crate::models::enums::TurnRole;
use crate::models::Turn;

/// Render turns as `"<role>: <text>"` lines in sequence order.
///
/// Output depends only on the turns themselves, so re-rendering the same
/// history is byte-identical.
pub fn render_lines(turns: &[Turn]) -> Vec<String> {
    ordered(turns)
        .map(|t| format!("{}: {}", t.role.as_str(), t.text))
        .collect()
}

pub fn render_transcript(turns: &[Turn]) -> String {
    render_lines(turns).join("\n")
}

pub fn first_patient_utterance(turns: &[Turn]) -> Option<String> {
    ordered(turns)
        .find(|t| t.role == TurnRole::Patient)
        .map(|t| t.text.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// All patient turns joined by newlines.
pub fn patient_text(turns: &[Turn]) -> String {
    role_text(turns, TurnRole::Patient)
}

pub fn assistant_text(turns: &[Turn]) -> String {
    role_text(turns, TurnRole::Assistant)
}

fn role_text(turns: &[Turn], role: TurnRole) -> String {
    ordered(turns)
        .filter(|t| t.role == role)
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn ordered(turns: &[Turn]) -> impl Iterator<Item = &Turn> {
    let mut refs: Vec<&Turn> = turns.iter().collect();
    refs.sort_by_key(|t| t.seq);
    refs.into_iter()
}
