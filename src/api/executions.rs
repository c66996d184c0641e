/// Run history endpoints

use crate::api::AppState;
use crate::execution::Run;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};

pub fn create_execution_routes() -> Router<AppState> {
    Router::new()
        .route("/api/executions/{workflow_id}", get(list_executions))
        .route("/api/execution-details/{id}", get(get_execution))
}

/// GET /api/executions/{workflow_id}, newest first
async fn list_executions(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> Result<Json<Vec<Run>>, StatusCode> {
    state.runs.list_for_workflow(&workflow_id).await.map(Json).map_err(|e| {
        tracing::error!("Failed to list runs of {}: {}", workflow_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// GET /api/execution-details/{id}
async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Run>, StatusCode> {
    match state.runs.get(&id).await {
        Ok(Some(run)) => Ok(Json(run)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get run {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
