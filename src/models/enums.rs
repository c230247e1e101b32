use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde uses the same string form as the database column.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(Stage {
    ChiefComplaint => "chief_complaint",
    SymptomDetails => "symptom_details",
    SafetyChecks => "safety_checks",
    History => "history",
    WrapUp => "wrap_up",
    Done => "done",
});

str_enum!(TurnRole {
    Assistant => "assistant",
    Patient => "patient",
});

str_enum!(ChunkSource {
    StructuredField => "structured-field",
    PatientUtterances => "patient-utterances",
    AssistantUtterances => "assistant-utterances",
});

str_enum!(FieldGroup {
    ChiefComplaint => "chief_complaint",
    Symptoms => "symptoms",
    Medications => "medications",
    Allergies => "allergies",
    Histories => "histories",
    RedFlags => "red_flags",
    GoalsAndNotes => "goals_and_notes",
});

str_enum!(NoteOrigin {
    Generated => "generated",
    Heuristic => "heuristic",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_round_trips_through_str() {
        for stage in [
            Stage::ChiefComplaint,
            Stage::SymptomDetails,
            Stage::SafetyChecks,
            Stage::History,
            Stage::WrapUp,
            Stage::Done,
        ] {
            assert_eq!(Stage::from_str(stage.as_str()).unwrap(), stage);
        }
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = ChunkSource::from_str("summary").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&ChunkSource::PatientUtterances).unwrap();
        assert_eq!(json, "\"patient-utterances\"");
        let stage: Stage = serde_json::from_str("\"wrap_up\"").unwrap();
        assert_eq!(stage, Stage::WrapUp);
    }
}
