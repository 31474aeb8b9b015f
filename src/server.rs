//! Webhook HTTP surface.
//!
//! One POST route triggers generation for a record; a health route answers
//! liveness probes. Authentication is a shared-secret header checked before
//! anything touches the upstream service, so an unauthorized caller learns
//! nothing about record ids or table structure. Failures come back as a
//! uniform `{ "ok": false, "error": ... }` body with the status mapped from
//! [`ContractError::status`].

use crate::bitable::TableStore;
use crate::config::AppConfig;
use crate::error::ContractError;
use crate::generate::generate_contract;
use crate::pipeline::render::HtmlRenderer;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

/// Shared handler state: configuration plus the two capability seams.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn TableStore>,
    pub renderer: Arc<dyn HtmlRenderer>,
}

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/contracts/print", post(print_contract))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Trigger payload. Automation platforms disagree on the key casing.
#[derive(Debug, Deserialize, Default)]
struct PrintRequest {
    record_id: Option<String>,
    #[serde(rename = "recordId")]
    record_id_camel: Option<String>,
}

impl PrintRequest {
    fn record_id(&self) -> Option<&str> {
        self.record_id
            .as_deref()
            .or(self.record_id_camel.as_deref())
            .filter(|s| !s.is_empty())
    }
}

async fn print_contract(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<PrintRequest>, JsonRejection>,
) -> Response {
    // A malformed body is handled after auth, as a missing record id.
    let body = body.ok().map(|Json(b)| b);
    match handle_print(&state, &headers, body).await {
        Ok(artifact) => Json(json!({
            "ok": true,
            "record_id": artifact.record_id,
            "file_token": artifact.file_token,
            "file_name": artifact.file_name,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "contract generation failed");
            let status =
                StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({ "ok": false, "error": e.to_string() }))).into_response()
        }
    }
}

async fn handle_print(
    state: &AppState,
    headers: &HeaderMap,
    body: Option<PrintRequest>,
) -> Result<crate::generate::PublishedArtifact, ContractError> {
    // Auth first: nothing upstream is touched on a bad secret.
    if let Some(secret) = &state.config.webhook_secret {
        let presented = headers
            .get(WEBHOOK_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(secret.as_str()) {
            return Err(ContractError::Unauthorized);
        }
    }

    let record_id = body
        .as_ref()
        .and_then(PrintRequest::record_id)
        .ok_or(ContractError::MissingRecordId)?
        .to_string();

    generate_contract(
        state.store.as_ref(),
        state.renderer.as_ref(),
        &state.config,
        &record_id,
    )
    .await
}
