//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub generation_model: String,
    pub embedding_dim: usize,
}

/// `GET /api/health`: liveness plus the configured model setup.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        generation_model: ctx.core.generation_model.clone(),
        embedding_dim: ctx.core.embedding_dim,
    }))
}
