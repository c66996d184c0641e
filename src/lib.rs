/// Flowforge: workflow automation execution engine
///
/// Runs user-authored workflows (a trigger step followed by a chain of action
/// steps) against external services, recording a durable, per-step log of
/// every run.

// Core configuration and setup
pub mod config;

// Step-level error taxonomy
pub mod error;

// SQLite handle shared by all stores
pub mod database;

// Per-user provider credentials
pub mod credentials;

// Workflow definitions, typed step configuration, successor graph and storage
pub mod workflow;

// Run records and the durable run store
pub mod execution;

// Orchestrator, dispatcher, variable resolution and provider boundaries
pub mod runtime;

// HTTP API layer - REST endpoints for workflows, runs, credentials and webhooks
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::StepError;
pub use execution::{Run, RunOutcome, RunStatus, StepLogEntry, StepStatus};
pub use runtime::{ExecutionEngine, NodeExecutor, StepOutcome};
pub use server::start_server;
pub use workflow::{Link, Step, StepKind, TriggerKind, Workflow};
