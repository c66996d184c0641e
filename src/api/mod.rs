/// HTTP API layer
///
/// REST endpoints over the stores and the execution engine:
/// - workflow CRUD and manual runs
/// - webhook-triggered runs
/// - run history
/// - per-user credentials
///
/// There is no authentication; the caller is identified by the `X-User-Id`
/// header.

use crate::{
    credentials::CredentialStorage, execution::RunStore, runtime::ExecutionEngine,
    workflow::storage::WorkflowStorage,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

// Workflow management endpoints (POST/GET/PUT/DELETE) and manual runs
pub mod workflows;

// Webhook-triggered runs
pub mod webhooks;

// Run history
pub mod executions;

// Per-user provider credentials
pub mod credentials;

pub use credentials::create_credential_routes;
pub use executions::create_execution_routes;
pub use webhooks::create_webhook_routes;
pub use workflows::create_workflow_routes;

/// Header carrying the caller's user ID
pub const USER_HEADER: &str = "x-user-id";

/// User assumed when the header is absent
pub const DEFAULT_USER: &str = "default-user";

/// Shared resources for every handler
#[derive(Clone)]
pub struct AppState {
    pub workflows: WorkflowStorage,
    pub runs: Arc<dyn RunStore>,
    pub credentials: CredentialStorage,
    pub engine: Arc<ExecutionEngine>,
}

/// Caller identity taken from `X-User-Id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_USER);
        Ok(CallerId(user.to_string()))
    }
}
