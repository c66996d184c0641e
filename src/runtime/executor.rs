/// Step dispatcher
///
/// Executes exactly one step: parses its wire configuration into a
/// [`StepKind`], runs the matching handler and folds the result into a
/// [`StepOutcome`]. Handlers share nothing but what is passed in; the run's
/// output map is borrowed read-only.

use crate::credentials::CredentialResolver;
use crate::error::StepError;
use crate::runtime::messaging;
use crate::runtime::providers::{CompletionRequest, HttpRequest, Providers};
use crate::runtime::sandbox::LuaSandbox;
use crate::runtime::spreadsheet;
use crate::runtime::template::{resolve, NodeOutputs};
use crate::workflow::step::{
    non_empty, AiModelConfig, HttpRequestConfig, ManualTriggerConfig, SpreadsheetConfig, SpreadsheetOperation,
    StepKind,
};
use crate::workflow::types::Step;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

/// Credential service name for AI completions
pub const AI_CREDENTIAL_SERVICE: &str = "groq";

/// Result of one step: an output value or an error message, never both
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Success(Value),
    Failure(String),
}

/// Dispatches steps to their handlers
///
/// Holds the provider boundaries, the credential resolver and the code
/// sandbox. One executor serves every run; it carries no per-run state.
#[derive(Debug)]
pub struct NodeExecutor {
    providers: Providers,
    credentials: CredentialResolver,
    sandbox: LuaSandbox,
    /// Base directory for relative spreadsheet paths
    files_dir: PathBuf,
}

impl NodeExecutor {
    pub fn new(
        providers: Providers,
        credentials: CredentialResolver,
        sandbox: LuaSandbox,
        files_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            providers,
            credentials,
            sandbox,
            files_dir: files_dir.into(),
        }
    }

    /// Execute one step against the current data and the run's prior outputs
    pub async fn execute_step(
        &self,
        step: &Step,
        input: &Value,
        outputs: &NodeOutputs,
        user_id: &str,
    ) -> StepOutcome {
        tracing::info!("🚀 Starting step execution: {} (type: {})", step.id, step.step_type);
        tracing::debug!("📥 Input data: {}", input);

        let start_time = std::time::Instant::now();

        let result = match StepKind::parse(step) {
            Ok(kind) => self.dispatch(kind, input, outputs, user_id).await,
            Err(e) => Err(e),
        };

        let duration = start_time.elapsed();

        match result {
            Ok(output) => {
                tracing::info!("✅ Step execution completed: {} in {:?}", step.id, duration);
                tracing::debug!("📤 Output data: {}", output);
                StepOutcome::Success(output)
            }
            Err(e) => {
                tracing::error!("❌ Step execution failed: {} in {:?} - Error: {}", step.id, duration, e);
                StepOutcome::Failure(e.to_string())
            }
        }
    }

    async fn dispatch(
        &self,
        kind: StepKind,
        input: &Value,
        outputs: &NodeOutputs,
        user_id: &str,
    ) -> Result<Value, StepError> {
        match kind {
            StepKind::ManualTrigger(config) => Ok(manual_trigger(&config, input)),
            StepKind::WebhookTrigger => Ok(input.clone()),
            StepKind::HttpRequest(config) => self.execute_http_request(&config, input, outputs).await,
            StepKind::AiModel(config) => self.execute_ai_model(&config, input, outputs, user_id).await,
            StepKind::Code(config) => {
                tracing::debug!("🧠 Running sandboxed code ({} bytes)", config.code.len());
                self.sandbox.run(config.code, input.clone()).await
            }
            StepKind::Spreadsheet(config) => self.execute_spreadsheet(&config, input).await,
            StepKind::Whatsapp(config) => {
                if non_empty(&config.to).is_none() {
                    return Err(StepError::config("Missing 'To' number"));
                }
                messaging::for_each_item(input, |item| {
                    messaging::send_whatsapp(&self.providers, &config, item, outputs)
                })
                .await
            }
            StepKind::Slack(config) => {
                messaging::for_each_item(input, |item| messaging::send_slack(&self.providers, &config, item, outputs))
                    .await
            }
            StepKind::Gmail(config) => {
                if non_empty(&config.to).is_none() {
                    return Err(StepError::config("No recipients defined"));
                }
                messaging::for_each_item(input, |item| messaging::send_gmail(&self.providers, &config, item, outputs))
                    .await
            }
            StepKind::Discord(config) => {
                let webhook_url = non_empty(&config.webhook_url)
                    .ok_or_else(|| StepError::config("Webhook URL is required"))?;
                messaging::for_each_item(input, |item| {
                    messaging::send_discord(&self.providers, webhook_url, &config, item, outputs)
                })
                .await
            }
            StepKind::Unknown(tag) => {
                tracing::debug!("⏭️ Unknown step type '{}', passing input through", tag);
                Ok(input.clone())
            }
        }
    }

    async fn execute_http_request(
        &self,
        config: &HttpRequestConfig,
        input: &Value,
        outputs: &NodeOutputs,
    ) -> Result<Value, StepError> {
        let url = non_empty(&config.url).ok_or_else(|| StepError::config("URL is required"))?;
        let url = resolve(url, input, outputs);

        let method_name = non_empty(&config.method).unwrap_or("GET").to_uppercase();
        let method = match method_name.as_str() {
            "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" => method_name
                .parse::<reqwest::Method>()
                .map_err(|e| StepError::config(format!("Invalid HTTP method '{}': {}", method_name, e)))?,
            other => return Err(StepError::config(format!("Unsupported HTTP method: {}", other))),
        };

        let headers = parse_headers(config.headers.as_ref(), input, outputs)?;
        let body = parse_body(config.body.as_ref(), input, outputs)?;

        tracing::debug!("🌐 HTTP step: {} {}", method, url);
        let response = self
            .providers
            .http
            .send(HttpRequest { method: method.clone(), url: url.clone(), headers, body })
            .await?;

        if !response.is_success() {
            return Err(StepError::provider(format!(
                "Request failed with status code {}",
                response.status
            )));
        }

        tracing::info!("✅ HTTP request completed: {} {} (status: {})", method, url, response.status);
        Ok(response.body)
    }

    async fn execute_ai_model(
        &self,
        config: &AiModelConfig,
        input: &Value,
        outputs: &NodeOutputs,
        user_id: &str,
    ) -> Result<Value, StepError> {
        let api_key = self
            .credentials
            .resolve(AI_CREDENTIAL_SERVICE, user_id)
            .await
            .map_err(|e| StepError::provider(format!("credential lookup failed: {}", e)))?
            .ok_or_else(|| {
                StepError::config("Groq API Key not found. Please add it in Settings > Credentials.")
            })?;

        let mut prompt = config
            .prompt
            .as_deref()
            .map(|p| resolve(p, input, outputs))
            .unwrap_or_default();
        if input.is_object() || input.is_array() {
            prompt.push_str(&format!("\n\nContext: {}", input));
        }

        let request = CompletionRequest {
            model: config.model().to_string(),
            prompt,
            temperature: config.temperature(),
            max_tokens: config.max_tokens(),
        };
        tracing::debug!("🤖 Completion request: model={} max_tokens={}", request.model, request.max_tokens);

        let completion = self.providers.completions.complete(&api_key, request).await?;
        Ok(completion.map(Value::String).unwrap_or(Value::Null))
    }

    async fn execute_spreadsheet(&self, config: &SpreadsheetConfig, input: &Value) -> Result<Value, StepError> {
        let path = spreadsheet::resolve_path(&self.files_dir, non_empty(&config.file_path))?;

        match config.operation {
            SpreadsheetOperation::Write => {
                let rows = spreadsheet_rows(config.json_data.as_ref(), input)?;
                let count = rows.len();
                tracing::debug!("📊 Writing {} rows to {}", count, path.display());

                let target = path.clone();
                tokio::task::spawn_blocking(move || spreadsheet::write_rows(&target, &rows))
                    .await
                    .map_err(|e| StepError::File(format!("spreadsheet worker crashed: {}", e)))??;

                Ok(Value::String(format!("Successfully wrote {} rows to {}", count, path.display())))
            }
            SpreadsheetOperation::Read => {
                tracing::debug!("📊 Reading rows from {}", path.display());
                let rows = tokio::task::spawn_blocking(move || spreadsheet::read_rows(&path))
                    .await
                    .map_err(|e| StepError::File(format!("spreadsheet worker crashed: {}", e)))??;
                Ok(Value::Array(rows))
            }
        }
    }
}

/// Caller data wins; test data only fills in for an empty payload
fn manual_trigger(config: &ManualTriggerConfig, input: &Value) -> Value {
    let is_empty = match input {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };

    if is_empty {
        match &config.test_data {
            Some(Value::String(text)) if !text.trim().is_empty() => {
                return serde_json::from_str(text).unwrap_or_else(|_| json!({ "message": text }));
            }
            Some(Value::Null) | Some(Value::String(_)) | None => {}
            Some(structured) => return structured.clone(),
        }
    }

    if input.is_null() {
        json!({ "message": "Workflow started manually" })
    } else {
        input.clone()
    }
}

/// Headers as a JSON object, or a string holding one; values are templated
fn parse_headers(
    raw: Option<&Value>,
    input: &Value,
    outputs: &NodeOutputs,
) -> Result<Vec<(String, String)>, StepError> {
    let parsed = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(Vec::new()),
        Some(Value::String(text)) => serde_json::from_str::<Value>(text)
            .map_err(|e| StepError::config(format!("Invalid headers JSON: {}", e)))?,
        Some(other) => other.clone(),
    };

    let Value::Object(map) = parsed else {
        return Err(StepError::config("Headers must be a JSON object"));
    };

    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => resolve(&s, input, outputs),
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

/// Body as any JSON value, or a string holding JSON after token resolution
fn parse_body(raw: Option<&Value>, input: &Value, outputs: &NodeOutputs) -> Result<Option<Value>, StepError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => {
            let resolved = resolve(text, input, outputs);
            serde_json::from_str(&resolved)
                .map(Some)
                .map_err(|e| StepError::config(format!("Invalid body JSON: {}", e)))
        }
        Some(other) => Ok(Some(other.clone())),
    }
}

/// Rows to write: explicit `jsonData` when set, else the current input as a list
fn spreadsheet_rows(json_data: Option<&Value>, input: &Value) -> Result<Vec<Value>, StepError> {
    let source = match json_data {
        Some(Value::String(text)) if !text.trim().is_empty() => serde_json::from_str(text)
            .map_err(|e| StepError::config(format!("Invalid jsonData: {}", e)))?,
        Some(Value::Null) | Some(Value::String(_)) | None => input.clone(),
        Some(explicit) => explicit.clone(),
    };

    let rows = match source {
        Value::Array(items) => items,
        single => vec![single],
    };

    Ok(rows
        .into_iter()
        .map(|row| match row {
            Value::Object(_) => row,
            scalar => {
                let mut wrapped = Map::new();
                wrapped.insert("value".to_string(), scalar);
                Value::Object(wrapped)
            }
        })
        .collect())
}
