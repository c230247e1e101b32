use uuid::Uuid;

use super::parser::parse_note_response;
use super::prompt::{build_corrective_prompt, build_note_prompt, NOTE_SYSTEM_PROMPT};
use super::sanitize::sanitize_for_prompt;
use super::types::{LlmClient, NoteOutcome, ResponseFormat};
use super::validation::{normalise_note, validate_note};
use super::StructuringError;
use crate::models::{StructuredNote, Turn};
use crate::pipeline::intake::{first_patient_utterance, render_transcript};

/// First attempt plus one corrective retry.
const MAX_NOTE_ATTEMPTS: usize = 2;

/// Turns a finished transcript into a structured note:
/// sanitize → prompt → LLM → parse → validate → normalise, falling back to a
/// heuristic note when the model cannot produce a valid one.
pub struct NoteBuilder {
    llm: Box<dyn LlmClient + Send + Sync>,
    model_name: String,
}

impl NoteBuilder {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>, model_name: &str) -> Self {
        Self {
            llm,
            model_name: model_name.to_string(),
        }
    }

    /// Never fails: every error path ends in `NoteOutcome::Fallback`.
    pub fn build(&self, conversation_id: &Uuid, turns: &[Turn]) -> NoteOutcome {
        let _span = tracing::info_span!("build_note", conversation_id = %conversation_id).entered();

        let sanitized: Vec<Turn> = turns
            .iter()
            .map(|t| Turn {
                text: sanitize_for_prompt(&t.text),
                ..t.clone()
            })
            .collect();
        let transcript = render_transcript(&sanitized);

        let mut last_error: Option<StructuringError> = None;
        for attempt in 0..MAX_NOTE_ATTEMPTS {
            let prompt = match &last_error {
                None => build_note_prompt(&transcript),
                Some(e) => build_corrective_prompt(&transcript, &corrective_hint(e)),
            };

            match self.attempt(&prompt) {
                Ok(note) => {
                    tracing::info!(attempt = attempt + 1, "Structured note generated");
                    return NoteOutcome::Valid { note };
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "Note generation attempt failed");
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".into());
        tracing::warn!(reason = %reason, "Falling back to heuristic note");
        NoteOutcome::Fallback {
            note: StructuredNote::heuristic(first_patient_utterance(turns)),
            reason,
        }
    }

    fn attempt(&self, prompt: &str) -> Result<StructuredNote, StructuringError> {
        let raw = self.llm.generate(
            &self.model_name,
            prompt,
            NOTE_SYSTEM_PROMPT,
            ResponseFormat::Json,
        )?;
        let value = parse_note_response(&raw)?;
        let note = validate_note(value)?;
        Ok(normalise_note(note))
    }
}

/// What to tell the model on retry. Capability failures get a generic
/// reminder since there was no answer to correct.
fn corrective_hint(error: &StructuringError) -> String {
    match error {
        StructuringError::SchemaViolation(reason) => reason.clone(),
        StructuringError::MalformedResponse(_) => "the answer was not valid JSON".into(),
        _ => "no usable answer was received".into(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::enums::{Stage, TurnRole};
    use crate::pipeline::structuring::ollama::{MockLlmClient, ScriptedLlmClient};

    fn turns() -> Vec<Turn> {
        vec![
            Turn { seq: 0, role: TurnRole::Assistant, stage: Stage::ChiefComplaint, text: "What brings you in?".into() },
            Turn { seq: 1, role: TurnRole::Patient, stage: Stage::ChiefComplaint, text: "Headache for three days".into() },
        ]
    }

    fn scripted(script: Vec<Result<String, StructuringError>>) -> (NoteBuilder, Arc<ScriptedLlmClient>) {
        let client = Arc::new(ScriptedLlmClient::new(script));
        let builder = NoteBuilder::new(Box::new(client.clone()), "test-model");
        (builder, client)
    }

    #[test]
    fn valid_json_yields_valid_outcome() {
        let builder = NoteBuilder::new(
            Box::new(MockLlmClient::new(r#"{"chief_complaint": " headache ", "symptoms": [{"name": "headache"}]}"#)),
            "test-model",
        );
        let outcome = builder.build(&Uuid::new_v4(), &turns());
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.note().chief_complaint.as_deref(), Some("headache"));
        assert_eq!(outcome.note().symptoms.len(), 1);
    }

    #[test]
    fn schema_violation_retries_once_with_correction() {
        let (builder, client) = scripted(vec![
            Ok(r#"{"chief_complaint": "headache", "diagnosis": "migraine"}"#.into()),
            Ok(r#"```json
{"chief_complaint": "headache"}
```"#.into()),
        ]);
        let outcome = builder.build(&Uuid::new_v4(), &turns());
        assert!(matches!(outcome, NoteOutcome::Valid { .. }));

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("unknown key `diagnosis`"));
    }

    #[test]
    fn two_failures_fall_back_to_heuristic() {
        let (builder, client) = scripted(vec![
            Ok("not json".into()),
            Ok(r#"{"medications": [{"name": ""}]}"#.into()),
        ]);
        let outcome = builder.build(&Uuid::new_v4(), &turns());

        match &outcome {
            NoteOutcome::Fallback { note, reason } => {
                assert_eq!(note.chief_complaint.as_deref(), Some("Headache for three days"));
                assert!(note.symptoms.is_empty());
                assert!(reason.contains("medications[0]"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn capability_failure_falls_back() {
        let (builder, _) = scripted(vec![
            Err(StructuringError::Timeout(30)),
            Err(StructuringError::OllamaConnection("http://localhost:11434".into())),
        ]);
        let outcome = builder.build(&Uuid::new_v4(), &turns());
        assert!(outcome.is_fallback());
        assert_eq!(outcome.origin(), crate::models::enums::NoteOrigin::Heuristic);
    }

    #[test]
    fn fallback_without_patient_turns_has_no_chief_complaint() {
        let (builder, _) = scripted(vec![]);
        let assistant_only = vec![turns().remove(0)];
        let outcome = builder.build(&Uuid::new_v4(), &assistant_only);
        assert!(outcome.note().chief_complaint.is_none());
    }

    #[test]
    fn prompt_contains_rendered_transcript() {
        let (builder, client) = scripted(vec![Ok("{}".into())]);
        builder.build(&Uuid::new_v4(), &turns());
        assert!(client.prompts()[0].contains("patient: Headache for three days"));
    }
}
