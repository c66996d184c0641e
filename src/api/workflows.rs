/// Workflow management REST API endpoints
///
/// CRUD over the caller's workflow definitions, plus the manual run endpoint.
/// Workflows belong to the user who created them; other users get 404.

use crate::api::{AppState, CallerId};
use crate::workflow::types::{TriggerKind, Workflow};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Response for workflow creation/update operations
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub message: String,
}

/// Request body for workflow creation and update
#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub workflow: Workflow,
}

/// Response for a finished manual run
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub execution_id: String,
    pub status: String,
}

/// Create workflow management routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", post(create_workflow).get(list_workflows))
        .route(
            "/api/workflows/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/api/workflows/{id}/run", post(run_workflow))
}

/// Load a workflow the caller owns; anything else is 404
async fn owned_workflow(state: &AppState, id: &str, caller: &str) -> Result<Workflow, StatusCode> {
    match state.workflows.get_workflow(id).await {
        Ok(Some(workflow)) if workflow.owner_id == caller => Ok(workflow),
        Ok(_) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get workflow {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Create a new workflow
///
/// POST /api/workflows
/// Body: { "workflow": { "id"?: "...", "name": "...", "nodes": [...], "edges": [...] } }
async fn create_workflow(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Json(payload): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowResponse>), StatusCode> {
    let mut workflow = payload.workflow;
    if workflow.id.trim().is_empty() {
        workflow.id = uuid::Uuid::new_v4().to_string();
    }
    if workflow.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    workflow.owner_id = caller;

    match state.workflows.get_workflow(&workflow.id).await {
        Ok(Some(_)) => return Err(StatusCode::CONFLICT),
        Ok(None) => {}
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    }

    if let Err(e) = state.workflows.save_workflow(&workflow).await {
        tracing::error!("Failed to save workflow: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!("🔥 Created workflow: {} ({}) for {}", workflow.id, workflow.name, workflow.owner_id);

    Ok((
        StatusCode::CREATED,
        Json(WorkflowResponse {
            id: workflow.id.clone(),
            message: format!("Workflow '{}' created successfully", workflow.name),
        }),
    ))
}

/// List the caller's workflows
///
/// GET /api/workflows
/// Returns: { "workflows": [{ "id": "...", "name": "...", "created_at": "...", "updated_at": "..." }] }
async fn list_workflows(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<Json<Value>, StatusCode> {
    match state.workflows.list_workflows(&caller).await {
        Ok(workflows) => Ok(Json(json!({ "workflows": workflows }))),
        Err(e) => {
            tracing::error!("Failed to list workflows: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, StatusCode> {
    owned_workflow(&state, &id, &caller).await.map(Json)
}

/// Replace an existing workflow's definition
///
/// PUT /api/workflows/{id}
async fn update_workflow(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<String>,
    Json(payload): Json<CreateWorkflowRequest>,
) -> Result<Json<WorkflowResponse>, StatusCode> {
    let existing = owned_workflow(&state, &id, &caller).await?;

    let mut workflow = payload.workflow;
    workflow.id = existing.id;
    workflow.owner_id = existing.owner_id;
    if workflow.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    if let Err(e) = state.workflows.save_workflow(&workflow).await {
        tracing::error!("Failed to update workflow: {}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    tracing::info!("📝 Updated workflow: {} ({})", workflow.id, workflow.name);

    Ok(Json(WorkflowResponse {
        id: workflow.id.clone(),
        message: format!("Workflow '{}' updated successfully", workflow.name),
    }))
}

/// DELETE /api/workflows/{id}
async fn delete_workflow(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    owned_workflow(&state, &id, &caller).await?;

    match state.workflows.delete_workflow(&id).await {
        Ok(true) => {
            tracing::info!("🗑️ Deleted workflow: {}", id);
            Ok(Json(json!({ "message": "Workflow deleted successfully" })))
        }
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to delete workflow: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Run a workflow from its manual trigger and wait for the result
///
/// POST /api/workflows/{id}/run
/// Body: optional JSON payload handed to the trigger step
async fn run_workflow(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<RunResponse>, StatusCode> {
    let payload = parse_payload(&body)?;
    let workflow = owned_workflow(&state, &id, &caller).await?;

    match state.engine.run_workflow(&workflow, TriggerKind::Manual, payload, &caller).await {
        Ok(run) => Ok(Json(RunResponse {
            execution_id: run.id,
            status: run.status.as_str().to_string(),
        })),
        Err(e) => {
            tracing::error!("❌ Run of workflow {} could not be recorded: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Empty body means no payload; anything else must be JSON
pub(crate) fn parse_payload(body: &str) -> Result<Value, StatusCode> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| {
        tracing::warn!("❌ Invalid JSON payload: {}", e);
        StatusCode::BAD_REQUEST
    })
}
