//! Intake endpoints.
//!
//! - `POST /api/intake/start`: register a patient and ask the first question
//! - `POST /api/intake/message`: record a patient answer, get the next question

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::{parse_id, ApiError};
use crate::api::types::ApiContext;
use crate::intake_session::IntakeSessionService;
use crate::models::enums::Stage;

/// Longest patient message accepted, in characters.
const MAX_MESSAGE_CHARS: usize = 4_000;

#[derive(Deserialize)]
pub struct StartIntakeRequest {
    #[serde(default)]
    pub patient_display_name: Option<String>,
}

#[derive(Serialize)]
pub struct StartIntakeResponse {
    pub patient_id: String,
    pub conversation_id: String,
    pub first_question: String,
    pub stage: Stage,
}

#[derive(Deserialize)]
pub struct IntakeMessageRequest {
    pub conversation_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct IntakeMessageResponse {
    pub next_question: Option<String>,
    pub stage: Stage,
    pub is_complete: bool,
}

/// `POST /api/intake/start`
pub async fn start(
    State(ctx): State<ApiContext>,
    payload: Result<Json<StartIntakeRequest>, JsonRejection>,
) -> Result<Json<StartIntakeResponse>, ApiError> {
    let Json(req) = payload?;

    let started = ctx
        .blocking(move |core| {
            IntakeSessionService::new(core).start(req.patient_display_name.as_deref())
        })
        .await?;

    Ok(Json(StartIntakeResponse {
        patient_id: started.patient_id.to_string(),
        conversation_id: started.conversation_id.to_string(),
        first_question: started.first_question,
        stage: started.stage,
    }))
}

/// `POST /api/intake/message`
///
/// The message that completes the intake also builds and indexes the note,
/// so that call can take as long as one generation round trip.
pub async fn message(
    State(ctx): State<ApiContext>,
    payload: Result<Json<IntakeMessageRequest>, JsonRejection>,
) -> Result<Json<IntakeMessageResponse>, ApiError> {
    let Json(req) = payload?;
    let conversation_id = parse_id("conversation_id", &req.conversation_id)?;
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }
    if req.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message too long (max {MAX_MESSAGE_CHARS} chars)"
        )));
    }

    let turn = ctx
        .blocking(move |core| {
            IntakeSessionService::new(core).handle_message(&conversation_id, &req.message)
        })
        .await?;

    Ok(Json(IntakeMessageResponse {
        next_question: turn.next_question,
        stage: turn.stage,
        is_complete: turn.is_complete,
    }))
}
