/// Step-level error taxonomy
///
/// Every failure a step handler can produce falls into one of these buckets.
/// The dispatcher flattens them into the failure message recorded in the run log;
/// all of them are terminal for the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepError {
    /// Missing URL, credential, path, or malformed step configuration
    #[error("invalid step configuration: {0}")]
    Config(String),

    /// Transport failure, non-2xx response, or provider rejection
    #[error("provider error: {0}")]
    Provider(String),

    /// User code raised, or exceeded its time or memory budget
    #[error("sandbox error: {0}")]
    Sandbox(String),

    /// Spreadsheet file absent, unreadable, or not writable
    #[error("file error: {0}")]
    File(String),
}

impl StepError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}

impl From<reqwest::Error> for StepError {
    fn from(e: reqwest::Error) -> Self {
        Self::Provider(e.to_string())
    }
}

impl From<mlua::Error> for StepError {
    fn from(e: mlua::Error) -> Self {
        Self::Sandbox(e.to_string())
    }
}
