use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Stage, TurnRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub created_at: NaiveDateTime,
}

/// One role-tagged message. `seq` is assigned on append and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub seq: u32,
    pub role: TurnRole,
    pub stage: Stage,
    pub text: String,
}

/// A single intake session.
///
/// `stage_answers` counts patient answers recorded since the conversation
/// entered `stage`; it resets on every stage transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub stage: Stage,
    pub stage_answers: u32,
    pub turns: Vec<Turn>,
    pub is_complete: bool,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl Conversation {
    /// Sequence index the next appended turn will receive.
    pub fn next_seq(&self) -> u32 {
        self.turns.last().map(|t| t.seq + 1).unwrap_or(0)
    }

    pub fn patient_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.role == TurnRole::Patient)
    }
}
