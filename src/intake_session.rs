//! Intake session service.
//!
//! Ties the stage machine to persistence and runs the completion pipeline
//! (note build → note upsert → chunk indexing) exactly once, on the advance
//! that finishes the conversation. Every write for a conversation happens
//! under that conversation's lock.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_state::{CoreError, CoreState};
use crate::db::repository;
use crate::models::enums::Stage;
use crate::models::{Conversation, Patient, StoredNote};
use crate::pipeline::intake::StageMachine;
use crate::pipeline::storage::{ChunkIndexer, IndexReport, NoteChunker};
use crate::pipeline::structuring::NoteBuilder;

/// Longest patient display name kept.
const MAX_DISPLAY_NAME_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedIntake {
    pub patient_id: Uuid,
    pub conversation_id: Uuid,
    pub first_question: String,
    pub stage: Stage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub next_question: Option<String>,
    pub stage: Stage,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReindexResult {
    pub note_version: u32,
    pub chunks_indexed: usize,
    pub unchanged: bool,
}

pub struct IntakeSessionService<'a> {
    state: &'a CoreState,
}

impl<'a> IntakeSessionService<'a> {
    pub fn new(state: &'a CoreState) -> Self {
        Self { state }
    }

    /// Register a patient and open their first conversation.
    pub fn start(&self, display_name: Option<&str>) -> Result<StartedIntake, CoreError> {
        let display_name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| crate::pipeline::structuring::truncate_chars(n, MAX_DISPLAY_NAME_CHARS));

        let patient = Patient {
            id: Uuid::new_v4(),
            display_name,
            created_at: Utc::now().naive_utc(),
        };
        let machine = StageMachine::new(self.state.policy());
        let (conversation, first_question) = machine.start(patient.id)?;

        let conn = self.state.open_db()?;
        repository::create_patient_with_conversation(&conn, &patient, &conversation)?;

        tracing::info!(
            patient_id = %patient.id,
            conversation_id = %conversation.id,
            "Intake started"
        );

        Ok(StartedIntake {
            patient_id: patient.id,
            conversation_id: conversation.id,
            first_question,
            stage: conversation.stage,
        })
    }

    /// Record one patient message and return what the patient sees next.
    ///
    /// The advance that completes the conversation also builds the note and
    /// indexes it before returning. An indexing failure is logged and left
    /// for `reindex`; the conversation and note stay committed.
    pub fn handle_message(
        &self,
        conversation_id: &Uuid,
        message: &str,
    ) -> Result<TurnResult, CoreError> {
        let lock = self.state.locks().handle(conversation_id)?;
        let _guard = lock.lock().map_err(|_| CoreError::LockPoisoned)?;

        let conn = self.state.open_db()?;
        let mut conversation = load_conversation(&conn, conversation_id)?;

        let machine = StageMachine::new(self.state.policy());
        let outcome = machine.advance(&mut conversation, message)?;
        repository::record_advance(&conn, &conversation, &outcome.new_turns)?;

        if outcome.is_complete {
            tracing::info!(
                conversation_id = %conversation.id,
                turns = conversation.turns.len(),
                "Intake complete"
            );
            let note = self.derive_note(&conn, &conversation)?;
            if let Err(e) = self.index(&conversation, &note) {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    error = %e,
                    "Indexing after completion failed; re-index to retry"
                );
            }
        }

        Ok(TurnResult {
            next_question: outcome.next_question,
            stage: outcome.stage,
            is_complete: outcome.is_complete,
        })
    }

    /// The live note, `None` while the conversation has none yet.
    pub fn note(&self, conversation_id: &Uuid) -> Result<Option<StoredNote>, CoreError> {
        let conn = self.state.open_db()?;
        if repository::get_conversation(&conn, conversation_id)?.is_none() {
            return Err(not_found(conversation_id));
        }
        Ok(repository::get_note(&conn, conversation_id)?)
    }

    /// Re-run indexing for a completed conversation.
    ///
    /// With `regenerate` (or when no note exists yet) the note is rebuilt
    /// first, bumping its version. Otherwise the stored note is re-chunked;
    /// an unchanged set is left as is.
    pub fn reindex(
        &self,
        conversation_id: &Uuid,
        regenerate: bool,
    ) -> Result<ReindexResult, CoreError> {
        let lock = self.state.locks().handle(conversation_id)?;
        let _guard = lock.lock().map_err(|_| CoreError::LockPoisoned)?;

        let conn = self.state.open_db()?;
        let conversation = load_conversation(&conn, conversation_id)?;
        if !conversation.is_complete {
            return Err(CoreError::InvalidState(format!(
                "Conversation {conversation_id} is still in progress"
            )));
        }

        let note = match repository::get_note(&conn, conversation_id)? {
            Some(note) if !regenerate => note,
            _ => self.derive_note(&conn, &conversation)?,
        };
        let report = self.index(&conversation, &note)?;

        Ok(ReindexResult {
            note_version: note.version,
            chunks_indexed: report.chunks_indexed,
            unchanged: report.unchanged,
        })
    }

    fn derive_note(&self, conn: &Connection, conversation: &Conversation) -> Result<StoredNote, CoreError> {
        let builder = NoteBuilder::new(Box::new(self.state.llm()), &self.state.generation_model);
        let outcome = builder.build(&conversation.id, &conversation.turns);
        let origin = outcome.origin();
        let stored = repository::upsert_note(conn, &conversation.id, origin, &outcome.into_note())?;
        tracing::info!(
            conversation_id = %conversation.id,
            version = stored.version,
            origin = origin.as_str(),
            "Structured note stored"
        );
        Ok(stored)
    }

    fn index(&self, conversation: &Conversation, note: &StoredNote) -> Result<IndexReport, CoreError> {
        let indexer = ChunkIndexer::new(
            NoteChunker,
            self.state.embedder(),
            self.state.chunk_store(),
            self.state.embedding_dim,
        )
        .with_retry(self.state.retry());
        Ok(indexer.index(conversation, note)?)
    }
}

fn load_conversation(conn: &Connection, id: &Uuid) -> Result<Conversation, CoreError> {
    repository::get_conversation(conn, id)?.ok_or_else(|| not_found(id))
}

fn not_found(conversation_id: &Uuid) -> CoreError {
    CoreError::NotFound(format!("Conversation {conversation_id}"))
}
