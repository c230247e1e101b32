use serde::{Deserialize, Serialize};

use super::StructuringError;
use crate::models::enums::NoteOrigin;
use crate::models::StructuredNote;

/// Output format hint passed to the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// Text generation abstraction (allows mocking).
pub trait LlmClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        format: ResponseFormat,
    ) -> Result<String, StructuringError>;
}

/// Result of building a note. Both variants are usable downstream; the tag
/// records whether the model produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoteOutcome {
    Valid { note: StructuredNote },
    Fallback { note: StructuredNote, reason: String },
}

impl NoteOutcome {
    pub fn note(&self) -> &StructuredNote {
        match self {
            NoteOutcome::Valid { note } | NoteOutcome::Fallback { note, .. } => note,
        }
    }

    pub fn into_note(self) -> StructuredNote {
        match self {
            NoteOutcome::Valid { note } | NoteOutcome::Fallback { note, .. } => note,
        }
    }

    pub fn origin(&self) -> NoteOrigin {
        match self {
            NoteOutcome::Valid { .. } => NoteOrigin::Generated,
            NoteOutcome::Fallback { .. } => NoteOrigin::Heuristic,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, NoteOutcome::Fallback { .. })
    }
}

impl<T: LlmClient + ?Sized> LlmClient for std::sync::Arc<T> {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        format: ResponseFormat,
    ) -> Result<String, StructuringError> {
        (**self).generate(model, prompt, system, format)
    }
}
