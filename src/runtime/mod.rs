/// Runtime execution engine
///
/// - `engine`: run orchestrator (linear-chain traversal, per-step persistence)
/// - `executor`: step dispatcher, one handler per step kind
/// - `template`: `{{...}}` variable resolution
/// - `providers`: HTTP, AI completion, SMS and mail boundaries
/// - `sandbox`: Lua sandbox for code steps
/// - `spreadsheet`: xlsx read/write for spreadsheet steps
/// - `messaging`: single and batch sends for messaging steps

pub mod engine;
pub mod executor;
pub mod messaging;
pub mod providers;
pub mod sandbox;
pub mod spreadsheet;
pub mod template;

pub use engine::{ExecutionEngine, TraversalStrategy};
pub use executor::{NodeExecutor, StepOutcome};
pub use providers::Providers;
pub use sandbox::LuaSandbox;
pub use template::NodeOutputs;
