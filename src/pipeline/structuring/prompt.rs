pub const NOTE_SYSTEM_PROMPT: &str = r#"
You are a clinical intake structuring assistant. Given a conversation between a
patient and an intake assistant, you extract the key clinical information and
output strictly formatted JSON.

RULES:
1. Extract ONLY information the patient stated or clearly implied.
2. NEVER invent details, diagnoses or advice.
3. Use null for missing single values and [] for missing lists.
4. Output ONLY the JSON object, with no commentary before or after it.
"#;

/// JSON shape the model must return.
pub const NOTE_SCHEMA_DESCRIPTION: &str = r#"{
  "chief_complaint": string or null,
  "symptoms": [
    {
      "name": string,
      "onset": string or null,
      "duration": string or null,
      "location": string or null,
      "character": string or null,
      "severity": string or null,
      "aggravating_factors": string or null,
      "relieving_factors": string or null,
      "associated_symptoms": [string, ...],
      "red_flags": [string, ...]
    }
  ],
  "medications": [
    {
      "name": string,
      "dose": string or null,
      "frequency": string or null,
      "route": string or null,
      "indication": string or null
    }
  ],
  "allergies": [
    {
      "substance": string,
      "reaction": string or null,
      "severity": string or null
    }
  ],
  "past_medical_history": [string, ...],
  "family_history": [string, ...],
  "social_history": [string, ...],
  "red_flags": [string, ...],
  "patient_goals": string or null,
  "other_notes": string or null
}"#;

/// Build the first-attempt prompt for a rendered transcript.
pub fn build_note_prompt(transcript: &str) -> String {
    format!(
        "Here is the transcript of an intake conversation between a patient and an \
         assistant. Read it carefully and extract the structured information.\n\n\
         Return a single JSON object with exactly this structure:\n\n\
         {NOTE_SCHEMA_DESCRIPTION}\n\n\
         <transcript>\n{transcript}\n</transcript>\n\n\
         Return ONLY the JSON object."
    )
}

/// Build the retry prompt after the first answer was rejected.
pub fn build_corrective_prompt(transcript: &str, problem: &str) -> String {
    format!(
        "{}\n\nYour previous answer was rejected: {problem}\n\
         Fix this and return only a JSON object matching the structure exactly. \
         Do not add keys that are not in the structure.",
        build_note_prompt(transcript)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_transcript_and_schema() {
        let prompt = build_note_prompt("patient: headache");
        assert!(prompt.contains("<transcript>\npatient: headache\n</transcript>"));
        assert!(prompt.contains("\"aggravating_factors\""));
        assert!(prompt.contains("\"substance\""));
    }

    #[test]
    fn corrective_prompt_names_problem() {
        let prompt = build_corrective_prompt("patient: headache", "unknown key `diagnosis`");
        assert!(prompt.contains("rejected: unknown key `diagnosis`"));
        assert!(prompt.starts_with(&build_note_prompt("patient: headache")));
    }

    #[test]
    fn system_prompt_forbids_invention() {
        assert!(NOTE_SYSTEM_PROMPT.contains("NEVER invent"));
    }
}
