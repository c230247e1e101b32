//! Clinician-facing question answering over one patient's record.

use uuid::Uuid;

use crate::core_state::{CoreError, CoreState};
use crate::db::repository;
use crate::pipeline::rag::{ClinicianQuery, QaAnswer, QaOrchestrator};

/// Answer `question` from `patient_id`'s indexed material only.
///
/// `k` falls back to the configured default and is clamped by the retriever.
pub fn answer_question(
    state: &CoreState,
    patient_id: &Uuid,
    question: &str,
    k: Option<usize>,
) -> Result<QaAnswer, CoreError> {
    let conn = state.open_db()?;
    if !repository::patient_exists(&conn, patient_id)? {
        return Err(CoreError::NotFound(format!("Patient {patient_id}")));
    }
    drop(conn);

    let orchestrator = QaOrchestrator::new(
        state.llm(),
        &state.generation_model,
        state.embedder(),
        state.chunk_store(),
    );
    let query = ClinicianQuery {
        patient_id: *patient_id,
        question: question.to_string(),
        k: Some(k.unwrap_or(state.default_top_k)),
    };
    Ok(orchestrator.answer(&query)?)
}
