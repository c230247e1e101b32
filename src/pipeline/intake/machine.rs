use chrono::Utc;
use uuid::Uuid;

use super::stages::{StagePolicy, MAX_ANSWERS_PER_STAGE};
use super::IntakeError;
use crate::models::enums::{Stage, TurnRole};
use crate::models::{Conversation, Turn};

/// What one `advance` produced. `new_turns` are exactly the turns appended to
/// the conversation by this call, in sequence order.
#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    pub next_question: Option<String>,
    pub stage: Stage,
    pub is_complete: bool,
    pub new_turns: Vec<Turn>,
}

/// Drives one conversation through the fixed stage order.
///
/// Pure with respect to storage: callers load a `Conversation`, hand it in,
/// and persist whatever comes back.
pub struct StageMachine<'a, P: StagePolicy> {
    policy: &'a P,
}

impl<'a, P: StagePolicy> StageMachine<'a, P> {
    pub fn new(policy: &'a P) -> Self {
        Self { policy }
    }

    /// Create a conversation at the first stage with its opening question
    /// already appended as an assistant turn.
    pub fn start(&self, patient_id: Uuid) -> Result<(Conversation, String), IntakeError> {
        let mut conv = Conversation {
            id: Uuid::new_v4(),
            patient_id,
            stage: Stage::ChiefComplaint,
            stage_answers: 0,
            turns: Vec::new(),
            is_complete: false,
            started_at: Utc::now().naive_utc(),
            completed_at: None,
        };

        let question = self.opening_question(conv.stage);
        push_turn(&mut conv, TurnRole::Assistant, question.clone());
        Ok((conv, question))
    }

    /// Record one patient answer and decide what happens next.
    ///
    /// Fails without touching the conversation if it is already complete or
    /// the message is blank.
    pub fn advance(
        &self,
        conv: &mut Conversation,
        patient_text: &str,
    ) -> Result<AdvanceOutcome, IntakeError> {
        if conv.is_complete {
            return Err(IntakeError::ConversationComplete(conv.id.to_string()));
        }
        let text = patient_text.trim();
        if text.is_empty() {
            return Err(IntakeError::EmptyMessage);
        }

        let first_new = conv.turns.len();
        push_turn(conv, TurnRole::Patient, text.to_string());
        conv.stage_answers += 1;

        let satisfied = conv.stage_answers >= MAX_ANSWERS_PER_STAGE
            || self.policy.is_satisfied(conv.stage, conv.stage_answers);

        let follow_up = if satisfied {
            None
        } else {
            self.policy.question(conv.stage, asked_in_stage(conv))
        };

        let next_question = match follow_up {
            Some(q) => Some(q),
            None => self.enter_next_stage(conv),
        };

        match &next_question {
            Some(q) => push_turn(conv, TurnRole::Assistant, q.clone()),
            None => {
                conv.stage = Stage::Done;
                conv.stage_answers = 0;
                conv.is_complete = true;
                conv.completed_at = Some(Utc::now().naive_utc());
            }
        }

        tracing::debug!(
            conversation_id = %conv.id,
            stage = conv.stage.as_str(),
            is_complete = conv.is_complete,
            "Intake advanced"
        );

        Ok(AdvanceOutcome {
            next_question,
            stage: conv.stage,
            is_complete: conv.is_complete,
            new_turns: conv.turns[first_new..].to_vec(),
        })
    }

    /// Step to the next stage in the fixed order and return its opening
    /// question, or `None` once `Done` is reached. Resets the per-stage
    /// answer count.
    fn enter_next_stage(&self, conv: &mut Conversation) -> Option<String> {
        conv.stage = conv.stage.next();
        conv.stage_answers = 0;
        if conv.stage.is_terminal() {
            return None;
        }
        Some(self.opening_question(conv.stage))
    }

    /// The policy's first question for `stage`, or a generic prompt when the
    /// policy has none. A stage without policy questions is left on the
    /// next answer.
    fn opening_question(&self, stage: Stage) -> String {
        self.policy
            .question(stage, 0)
            .unwrap_or_else(|| generic_question(stage).to_string())
    }
}

fn generic_question(stage: Stage) -> &'static str {
    match stage {
        Stage::ChiefComplaint => "What brings you in today?",
        Stage::SymptomDetails => "Can you tell me more about your symptoms?",
        Stage::SafetyChecks => {
            "Have you had any sudden or severe symptoms, such as chest pain, trouble breathing or fainting?"
        }
        Stage::History => "Do you have any ongoing conditions, regular medications or allergies?",
        Stage::WrapUp | Stage::Done => "Is there anything else you would like to mention?",
    }
}

fn asked_in_stage(conv: &Conversation) -> u32 {
    conv.turns
        .iter()
        .filter(|t| t.role == TurnRole::Assistant && t.stage == conv.stage)
        .count() as u32
}

fn push_turn(conv: &mut Conversation, role: TurnRole, text: String) {
    let seq = conv.next_seq();
    conv.turns.push(Turn {
        seq,
        role,
        stage: conv.stage,
        text,
    });
}
