//! HTTP API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Layer stack (outermost → innermost):
//! 1. CORS → 2. Access logger → handler

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router over a shared core.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/intake/start", post(endpoints::intake::start))
        .route("/intake/message", post(endpoints::intake::message))
        .route("/conversations/:id/note", get(endpoints::notes::get_note))
        .route("/conversations/:id/reindex", post(endpoints::notes::reindex))
        .route("/patients/qa", post(endpoints::qa::ask))
        .with_state(ctx);

    Router::new()
        .nest("/api", routes)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::intake_session::tests::{test_state, HEADACHE_ANSWERS, HEADACHE_NOTE_JSON};
    use crate::pipeline::structuring::{LlmClient, ScriptedLlmClient, StructuringError};

    fn test_app(dir: &std::path::Path, llm: Arc<dyn LlmClient + Send + Sync>) -> Router {
        api_router(Arc::new(test_state(dir, llm)))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    async fn start_intake(app: &Router) -> (String, String) {
        let (status, json) = send(app, post_json("/api/intake/start", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        (
            json["patient_id"].as_str().unwrap().to_string(),
            json["conversation_id"].as_str().unwrap().to_string(),
        )
    }

    async fn complete_intake(app: &Router, conversation_id: &str) -> Value {
        let mut last = Value::Null;
        for answer in HEADACHE_ANSWERS {
            let (status, json) = send(
                app,
                post_json(
                    "/api/intake/message",
                    json!({ "conversation_id": conversation_id, "message": answer }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "unexpected body: {json}");
            last = json;
        }
        last
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));

        let (status, json) = send(&app, get_req("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["embedding_dim"], 64);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));

        let (status, _) = send(&app, get_req("/api/nonexistent")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn start_returns_first_question() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));

        let (status, json) = send(
            &app,
            post_json("/api/intake/start", json!({ "patient_display_name": "Ada" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["stage"], "chief_complaint");
        assert!(!json["first_question"].as_str().unwrap().is_empty());
        assert!(uuid::Uuid::parse_str(json["patient_id"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn message_advances_stage() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));
        let (_, conversation_id) = start_intake(&app).await;

        let (status, json) = send(
            &app,
            post_json(
                "/api/intake/message",
                json!({ "conversation_id": conversation_id, "message": HEADACHE_ANSWERS[0] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["stage"], "symptom_details");
        assert_eq!(json["is_complete"], false);
        assert!(json["next_question"].is_string());
    }

    #[tokio::test]
    async fn invalid_conversation_id_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));

        let (status, json) = send(
            &app,
            post_json(
                "/api/intake/message",
                json!({ "conversation_id": "not-a-uuid", "message": "hello" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));

        let req = Request::builder()
            .method("POST")
            .uri("/api/intake/message")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, json) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn blank_message_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));
        let (_, conversation_id) = start_intake(&app).await;

        let (status, _) = send(
            &app,
            post_json(
                "/api/intake/message",
                json!({ "conversation_id": conversation_id, "message": "   " }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_conversation_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));

        let (status, json) = send(
            &app,
            post_json(
                "/api/intake/message",
                json!({ "conversation_id": uuid::Uuid::new_v4(), "message": "hello" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn note_before_completion_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));
        let (_, conversation_id) = start_intake(&app).await;

        let (status, json) = send(
            &app,
            get_req(&format!("/api/conversations/{conversation_id}/note")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOTE_NOT_READY");
    }

    #[tokio::test]
    async fn reindex_before_completion_is_409() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));
        let (_, conversation_id) = start_intake(&app).await;

        let (status, json) = send(
            &app,
            post_json(
                &format!("/api/conversations/{conversation_id}/reindex"),
                json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "INVALID_STATE");
    }

    #[tokio::test]
    async fn bad_reindex_query_is_400_with_error_body() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));
        let (_, conversation_id) = start_intake(&app).await;

        let (status, json) = send(
            &app,
            post_json(
                &format!("/api/conversations/{conversation_id}/reindex?regenerate=maybe"),
                json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        assert_eq!(json["error"]["retryable"], false);
    }

    #[tokio::test]
    async fn full_intake_then_note_then_qa() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            Ok(HEADACHE_NOTE_JSON.into()),
            Ok("Penicillin allergy is documented [chunk 1].".into()),
        ]));
        let app = test_app(dir.path(), llm);
        let (patient_id, conversation_id) = start_intake(&app).await;

        let last = complete_intake(&app, &conversation_id).await;
        assert_eq!(last["is_complete"], true);
        assert_eq!(last["stage"], "done");
        assert!(last["next_question"].is_null());

        let (status, note) = send(
            &app,
            get_req(&format!("/api/conversations/{conversation_id}/note")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(note["version"], 1);
        assert_eq!(note["origin"], "generated");
        assert_eq!(note["chief_complaint"], "Headache for three days");
        assert_eq!(note["allergies"][0]["substance"], "penicillin");
        assert!(note["red_flags"].as_array().unwrap().is_empty());

        let (status, qa) = send(
            &app,
            post_json(
                "/api/patients/qa",
                json!({ "patient_id": patient_id, "question": "Any drug allergies?", "k": 3 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "unexpected body: {qa}");
        assert_eq!(qa["cited"], json!(["chunk 1"]));
        let chunks = qa["chunks"].as_array().unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks
            .iter()
            .all(|c| c["conversation_id"] == conversation_id.as_str()));

        // Completed conversations reject further messages.
        let (status, json) = send(
            &app,
            post_json(
                "/api/intake/message",
                json!({ "conversation_id": conversation_id, "message": "one more thing" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "INVALID_STATE");
    }

    #[tokio::test]
    async fn reindex_after_completion_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(HEADACHE_NOTE_JSON.into())]));
        let app = test_app(dir.path(), llm);
        let (_, conversation_id) = start_intake(&app).await;
        complete_intake(&app, &conversation_id).await;

        let (status, json) = send(
            &app,
            post_json(
                &format!("/api/conversations/{conversation_id}/reindex"),
                json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["note_version"], 1);
        assert_eq!(json["unchanged"], true);
    }

    #[tokio::test]
    async fn qa_for_unknown_patient_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path(), Arc::new(ScriptedLlmClient::new(vec![])));

        let (status, json) = send(
            &app,
            post_json(
                "/api/patients/qa",
                json!({ "patient_id": uuid::Uuid::new_v4(), "question": "Allergies?" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn qa_generation_timeout_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            Ok(HEADACHE_NOTE_JSON.into()),
            Err(StructuringError::Timeout(120)),
        ]));
        let app = test_app(dir.path(), llm);
        let (patient_id, conversation_id) = start_intake(&app).await;
        complete_intake(&app, &conversation_id).await;

        let (status, json) = send(
            &app,
            post_json(
                "/api/patients/qa",
                json!({ "patient_id": patient_id, "question": "Any allergies?" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"]["code"], "CAPABILITY_UNAVAILABLE");
        assert_eq!(json["error"]["retryable"], true);
    }
}
