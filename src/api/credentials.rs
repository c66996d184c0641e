/// Per-user credential endpoints
///
/// Secret values go in but never come back out: listing returns summaries only.

use crate::api::{AppState, CallerId};
use crate::credentials::CredentialSummary;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct CreateCredentialRequest {
    pub service: String,
    pub name: String,
    pub value: String,
}

pub fn create_credential_routes() -> Router<AppState> {
    Router::new()
        .route("/api/credentials", post(create_credential).get(list_credentials))
        .route("/api/credentials/{id}", delete(delete_credential))
}

/// Insert, or replace the value of the caller's credential with the same service and name
async fn create_credential(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Json(payload): Json<CreateCredentialRequest>,
) -> Result<Json<CredentialSummary>, StatusCode> {
    if payload.service.trim().is_empty() || payload.name.trim().is_empty() || payload.value.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state
        .credentials
        .upsert(payload.service.trim(), payload.name.trim(), &payload.value, &caller)
        .await
    {
        Ok(summary) => {
            tracing::info!("🔐 Stored '{}' credential '{}' for {}", summary.service, summary.name, caller);
            Ok(Json(summary))
        }
        Err(e) => {
            tracing::error!("Failed to store credential: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn list_credentials(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<Json<Vec<CredentialSummary>>, StatusCode> {
    state.credentials.list(&caller).await.map(Json).map_err(|e| {
        tracing::error!("Failed to list credentials: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn delete_credential(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    match state.credentials.delete(&id, &caller).await {
        Ok(true) => Ok(Json(json!({ "message": "Deleted" }))),
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to delete credential {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
