//! `POST /api/patients/qa`: grounded question answering for clinicians.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::{parse_id, ApiError};
use crate::api::types::ApiContext;
use crate::clinician;
use crate::models::enums::ChunkSource;

#[derive(Deserialize)]
pub struct QaRequest {
    pub patient_id: String,
    pub question: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct QaChunk {
    pub id: i64,
    pub conversation_id: String,
    pub source_type: ChunkSource,
    pub text: String,
    pub score: f32,
}

#[derive(Serialize)]
pub struct QaResponse {
    pub answer: String,
    pub chunks: Vec<QaChunk>,
    pub cited: Vec<String>,
}

pub async fn ask(
    State(ctx): State<ApiContext>,
    payload: Result<Json<QaRequest>, JsonRejection>,
) -> Result<Json<QaResponse>, ApiError> {
    let Json(req) = payload?;
    let patient_id = parse_id("patient_id", &req.patient_id)?;
    if req.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question cannot be empty".into()));
    }

    let answer = ctx
        .blocking(move |core| clinician::answer_question(core, &patient_id, &req.question, req.k))
        .await?;

    Ok(Json(QaResponse {
        answer: answer.answer,
        chunks: answer
            .chunks
            .into_iter()
            .map(|r| QaChunk {
                id: r.chunk.id,
                conversation_id: r.chunk.conversation_id.to_string(),
                source_type: r.chunk.source,
                text: r.chunk.text,
                score: r.score,
            })
            .collect(),
        cited: answer.cited,
    }))
}
