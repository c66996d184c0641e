/// Workflow Management Layer
///
/// Workflow definitions as the editor saves them, their typed step
/// configuration, the successor graph used for traversal, and SQLite storage.

// Core workflow type definitions
pub mod types;

// Closed tagged union of step configurations
pub mod step;

// Successor graph built from steps and links
pub mod graph;

// SQLite persistence layer for workflow storage
pub mod storage;

// Re-export commonly used types
pub use graph::StepGraph;
pub use step::StepKind;
pub use types::{Link, Step, TriggerKind, Workflow};
