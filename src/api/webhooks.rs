/// Webhook-triggered runs
///
/// `POST /webhook/{workflow_id}` starts the workflow from its webhook trigger
/// on behalf of the workflow's owner. The run proceeds in the background; the
/// caller only gets an acknowledgement echoing the payload.

use crate::api::workflows::parse_payload;
use crate::api::AppState;
use crate::workflow::types::TriggerKind;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};

pub fn create_webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook/{workflow_id}", post(execute_webhook))
}

async fn execute_webhook(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    body: String,
) -> Result<Json<Value>, StatusCode> {
    tracing::info!("📥 Webhook request received: {}", workflow_id);
    tracing::debug!("📄 Request body: {}", body);

    let payload = parse_payload(&body)?;

    let workflow = match state.workflows.get_workflow(&workflow_id).await {
        Ok(Some(workflow)) => workflow,
        Ok(None) => {
            tracing::warn!("❌ Webhook called for unknown workflow: {}", workflow_id);
            return Err(StatusCode::NOT_FOUND);
        }
        Err(e) => {
            tracing::error!("Failed to load workflow {}: {}", workflow_id, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let engine = state.engine.clone();
    let run_payload = payload.clone();
    tokio::spawn(async move {
        let owner = workflow.owner_id.clone();
        match engine.run_workflow(&workflow, TriggerKind::Webhook, run_payload, &owner).await {
            Ok(run) => tracing::info!("🎯 Webhook run {} of {} finished: {}", run.id, workflow.id, run.status.as_str()),
            Err(e) => tracing::error!("❌ Webhook run of {} could not be recorded: {}", workflow.id, e),
        }
    });

    Ok(Json(json!({
        "message": "Webhook received, workflow started",
        "data": payload,
    })))
}
