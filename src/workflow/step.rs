/// Typed step configuration
///
/// The editor stores each step's configuration as an open JSON bag. Before a
/// step runs, the dispatcher parses that bag into one of these closed variants,
/// so every handler works against a typed record and malformed configuration
/// becomes a step failure instead of a panic deep inside a handler.

use crate::error::StepError;
use crate::workflow::types::Step;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// One variant per supported step type
#[derive(Debug, Clone)]
pub enum StepKind {
    ManualTrigger(ManualTriggerConfig),
    WebhookTrigger,
    HttpRequest(HttpRequestConfig),
    AiModel(AiModelConfig),
    Code(CodeConfig),
    Spreadsheet(SpreadsheetConfig),
    Whatsapp(WhatsappConfig),
    Slack(SlackConfig),
    Gmail(GmailConfig),
    Discord(DiscordConfig),
    /// Unrecognised type tag; executes as a passthrough
    Unknown(String),
}

impl StepKind {
    /// Parse a step's wire configuration into its typed variant
    pub fn parse(step: &Step) -> Result<Self, StepError> {
        let data = match &step.data {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };

        let kind = match step.step_type.as_str() {
            "manualTrigger" => StepKind::ManualTrigger(config(data, step)?),
            "webhookTrigger" => StepKind::WebhookTrigger,
            "httpRequest" => StepKind::HttpRequest(config(data, step)?),
            "aiModel" => StepKind::AiModel(config(data, step)?),
            "code" => StepKind::Code(config(data, step)?),
            "excel" | "spreadsheet" => StepKind::Spreadsheet(config(data, step)?),
            "whatsapp" => StepKind::Whatsapp(config(data, step)?),
            "slack" => StepKind::Slack(config(data, step)?),
            "gmail" => StepKind::Gmail(config(data, step)?),
            "discord" => StepKind::Discord(config(data, step)?),
            other => StepKind::Unknown(other.to_string()),
        };
        Ok(kind)
    }
}

fn config<T: DeserializeOwned>(data: Value, step: &Step) -> Result<T, StepError> {
    serde_json::from_value(data)
        .map_err(|e| StepError::config(format!("step '{}' ({}): {}", step.id, step.step_type, e)))
}

/// Non-empty string field, treating "" as unset (the editor saves blanks)
pub fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Numeric field that may arrive as a number or a numeric string
fn loose_number(field: &Option<Value>) -> Option<f64> {
    match field {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualTriggerConfig {
    /// Sample payload used when the caller supplies nothing
    #[serde(default)]
    pub test_data: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    /// JSON object, or a string containing one
    #[serde(default)]
    pub headers: Option<Value>,
    /// Any JSON value, or a string containing JSON
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiModelConfig {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<Value>,
    #[serde(default)]
    pub max_tokens: Option<Value>,
}

impl AiModelConfig {
    pub const DEFAULT_MODEL: &'static str = "mixtral-8x7b-32768";

    pub fn model(&self) -> &str {
        non_empty(&self.model).unwrap_or(Self::DEFAULT_MODEL)
    }

    pub fn temperature(&self) -> f64 {
        loose_number(&self.temperature).filter(|t| *t != 0.0).unwrap_or(0.7)
    }

    pub fn max_tokens(&self) -> u32 {
        loose_number(&self.max_tokens)
            .filter(|t| *t >= 1.0)
            .map(|t| t as u32)
            .unwrap_or(1024)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeConfig {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadsheetOperation {
    #[default]
    Read,
    Write,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetConfig {
    #[serde(default)]
    pub operation: SpreadsheetOperation,
    #[serde(default)]
    pub file_path: Option<String>,
    /// Explicit rows to write instead of the current input
    #[serde(default)]
    pub json_data: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsappConfig {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailConfig {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(step_type: &str, data: Value) -> Step {
        Step { id: "s1".into(), step_type: step_type.into(), data, position: None }
    }

    #[test]
    fn unknown_tag_is_passthrough_variant() {
        let kind = StepKind::parse(&step("sticky-note", json!({"text": "hi"}))).unwrap();
        assert!(matches!(kind, StepKind::Unknown(tag) if tag == "sticky-note"));
    }

    #[test]
    fn data_type_does_not_change_the_handler() {
        let kind = StepKind::parse(&step("custom", json!({"type": "discord", "webhookUrl": "u"}))).unwrap();
        assert!(matches!(kind, StepKind::Unknown(tag) if tag == "custom"));
    }

    #[test]
    fn null_data_parses_with_defaults() {
        let kind = StepKind::parse(&step("excel", Value::Null)).unwrap();
        match kind {
            StepKind::Spreadsheet(c) => {
                assert_eq!(c.operation, SpreadsheetOperation::Read);
                assert!(c.file_path.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_config_is_config_error() {
        let err = StepKind::parse(&step("httpRequest", json!({"url": 42}))).unwrap_err();
        assert!(matches!(err, StepError::Config(_)));
    }

    #[test]
    fn ai_numbers_accept_strings_and_fall_back() {
        let cfg: AiModelConfig =
            serde_json::from_value(json!({"temperature": "0.2", "maxTokens": "bogus", "model": ""})).unwrap();
        assert_eq!(cfg.temperature(), 0.2);
        assert_eq!(cfg.max_tokens(), 1024);
        assert_eq!(cfg.model(), AiModelConfig::DEFAULT_MODEL);
    }
}
