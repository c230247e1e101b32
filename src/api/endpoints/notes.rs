//! Structured note endpoints.
//!
//! - `GET /api/conversations/:id/note`: the live note, 404 `NOTE_NOT_READY` before completion
//! - `POST /api/conversations/:id/reindex`: rebuild the chunk set (optionally the note too)

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::{parse_id, ApiError};
use crate::api::types::ApiContext;
use crate::intake_session::IntakeSessionService;
use crate::models::enums::NoteOrigin;
use crate::models::StructuredNote;

#[derive(Serialize)]
pub struct NoteResponse {
    pub conversation_id: String,
    pub version: u32,
    pub origin: NoteOrigin,
    pub created_at: String,
    #[serde(flatten)]
    pub note: StructuredNote,
}

#[derive(Deserialize, Default)]
pub struct ReindexParams {
    #[serde(default)]
    pub regenerate: bool,
}

#[derive(Serialize)]
pub struct ReindexResponse {
    pub note_version: u32,
    pub chunks_indexed: usize,
    pub unchanged: bool,
}

/// `GET /api/conversations/:id/note`
pub async fn get_note(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<NoteResponse>, ApiError> {
    let conversation_id = parse_id("conversation id", &id)?;

    let stored = ctx
        .blocking(move |core| IntakeSessionService::new(core).note(&conversation_id))
        .await?
        .ok_or_else(|| {
            ApiError::NoteNotReady(format!(
                "Conversation {conversation_id} has no structured note yet"
            ))
        })?;

    Ok(Json(NoteResponse {
        conversation_id: stored.conversation_id.to_string(),
        version: stored.version,
        origin: stored.origin,
        created_at: stored.created_at.and_utc().to_rfc3339(),
        note: stored.note,
    }))
}

/// `POST /api/conversations/:id/reindex[?regenerate=true]`
pub async fn reindex(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    params: Result<Query<ReindexParams>, QueryRejection>,
) -> Result<Json<ReindexResponse>, ApiError> {
    let conversation_id = parse_id("conversation id", &id)?;
    let Query(params) = params?;

    let result = ctx
        .blocking(move |core| {
            IntakeSessionService::new(core).reindex(&conversation_id, params.regenerate)
        })
        .await?;

    Ok(Json(ReindexResponse {
        note_version: result.note_version,
        chunks_indexed: result.chunks_indexed,
        unchanged: result.unchanged,
    }))
}
