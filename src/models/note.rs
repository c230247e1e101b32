use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NoteOrigin;

/// Structured clinical summary of one completed intake.
///
/// List fields are always present (possibly empty) so consumers never have to
/// distinguish "missing" from "none reported".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredNote {
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub past_medical_history: Vec<String>,
    #[serde(default)]
    pub family_history: Vec<String>,
    #[serde(default)]
    pub social_history: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    pub patient_goals: Option<String>,
    pub other_notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub name: String,
    pub onset: Option<String>,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub character: Option<String>,
    pub severity: Option<String>,
    pub aggravating_factors: Option<String>,
    pub relieving_factors: Option<String>,
    #[serde(default)]
    pub associated_symptoms: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dose: Option<String>,
    pub frequency: Option<String>,
    pub route: Option<String>,
    pub indication: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Allergy {
    pub substance: String,
    pub reaction: Option<String>,
    pub severity: Option<String>,
}

impl StructuredNote {
    /// Note containing only a chief complaint. Used when generation fails.
    pub fn heuristic(chief_complaint: Option<String>) -> Self {
        Self {
            chief_complaint,
            ..Self::default()
        }
    }

    pub fn has_histories(&self) -> bool {
        !self.past_medical_history.is_empty()
            || !self.family_history.is_empty()
            || !self.social_history.is_empty()
    }
}

/// The live note of a conversation together with its bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredNote {
    pub conversation_id: Uuid,
    pub version: u32,
    pub origin: NoteOrigin,
    pub note: StructuredNote,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lists_deserialize_as_empty() {
        let note: StructuredNote =
            serde_json::from_str(r#"{"chief_complaint": "headache"}"#).unwrap();
        assert_eq!(note.chief_complaint.as_deref(), Some("headache"));
        assert!(note.symptoms.is_empty());
        assert!(note.red_flags.is_empty());
    }

    #[test]
    fn empty_lists_serialize_as_arrays_not_null() {
        let json = serde_json::to_value(StructuredNote::default()).unwrap();
        assert!(json["medications"].is_array());
        assert!(json["family_history"].is_array());
        assert!(json["chief_complaint"].is_null());
    }

    #[test]
    fn heuristic_note_only_sets_chief_complaint() {
        let note = StructuredNote::heuristic(Some("cough".into()));
        assert_eq!(note.chief_complaint.as_deref(), Some("cough"));
        assert!(note.symptoms.is_empty());
        assert!(note.patient_goals.is_none());
        assert!(!note.has_histories());
    }
}
