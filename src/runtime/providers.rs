/// External provider boundaries
///
/// Each side-effecting collaborator a step handler talks to sits behind a
/// trait, so the dispatcher can be driven against mocks in tests:
/// - [`HttpTransport`]: generic outbound HTTP (HTTP steps, Slack/Discord webhooks)
/// - [`CompletionProvider`]: chat completions (Groq, OpenAI-compatible)
/// - [`SmsProvider`]: Twilio Messages API (WhatsApp/SMS)
/// - [`MailTransport`]: SMTP relay (Gmail)

use crate::config::ProvidersConfig;
use crate::error::StepError;
use async_trait::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Outbound HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body, or plain text when the value is a string
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn post_json(url: &str, body: Value) -> Self {
        Self {
            method: reqwest::Method::POST,
            url: url.to_string(),
            headers: Vec::new(),
            body: Some(body),
        }
    }
}

/// Response with the body parsed as JSON when possible, else kept as text
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Only transport failures are errors; non-2xx responses are returned as-is
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StepError>;
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Text of the first choice, if the provider returned one
    async fn complete(&self, api_key: &str, request: CompletionRequest) -> Result<Option<String>, StepError>;
}

/// Twilio account credentials
#[derive(Debug, Clone)]
pub struct SmsAccount {
    pub account_sid: String,
    pub auth_token: String,
}

#[derive(Debug, Clone)]
pub struct SmsMessage {
    pub from: String,
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Returns the provider's message ID
    async fn send(&self, account: &SmsAccount, message: SmsMessage) -> Result<String, StepError>;
}

/// SMTP login; the user is also the sender address
#[derive(Debug, Clone)]
pub struct MailAccount {
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Returns the relay's acceptance reply
    async fn send(&self, account: &MailAccount, message: MailMessage) -> Result<String, StepError>;
}

/// All provider boundaries the dispatcher needs
#[derive(Clone)]
pub struct Providers {
    pub http: Arc<dyn HttpTransport>,
    pub completions: Arc<dyn CompletionProvider>,
    pub sms: Arc<dyn SmsProvider>,
    pub mail: Arc<dyn MailTransport>,
}

impl Providers {
    /// Real network-backed providers
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let client = reqwest::Client::new();
        Self {
            http: Arc::new(ReqwestTransport { client: client.clone() }),
            completions: Arc::new(GroqCompletions {
                client: client.clone(),
                base_url: config.groq_base_url.trim_end_matches('/').to_string(),
            }),
            sms: Arc::new(TwilioSms {
                client,
                base_url: config.twilio_base_url.trim_end_matches('/').to_string(),
            }),
            mail: Arc::new(SmtpMailer { relay: config.smtp_relay.clone() }),
        }
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}

/// reqwest-backed HTTP transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StepError> {
        tracing::debug!("🌍 HTTP Request: {} {}", request.method, request.url);

        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        match request.body {
            Some(Value::String(text)) => {
                builder = builder.header("Content-Type", "text/plain").body(text);
            }
            Some(Value::Null) | None => {}
            Some(body) => {
                builder = builder.json(&body);
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StepError::provider(format!("HTTP request failed: {}", e)))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| StepError::provider(format!("Failed to read response body: {}", e)))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        tracing::debug!("📡 Response status: {}", status);
        Ok(HttpResponse { status, body })
    }
}

/// Groq chat completions (OpenAI-compatible wire format)
#[derive(Debug, Clone)]
pub struct GroqCompletions {
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl CompletionProvider for GroqCompletions {
    async fn complete(&self, api_key: &str, request: CompletionRequest) -> Result<Option<String>, StepError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&json!({
                "messages": [{ "role": "user", "content": request.prompt }],
                "model": request.model,
                "temperature": request.temperature,
                "max_tokens": request.max_tokens,
            }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("completion request rejected");
            return Err(StepError::provider(format!("{} ({})", message, status)));
        }

        Ok(body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

/// Twilio Messages API
#[derive(Debug, Clone)]
pub struct TwilioSms {
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl SmsProvider for TwilioSms {
    async fn send(&self, account: &SmsAccount, message: SmsMessage) -> Result<String, StepError> {
        let url = format!("{}/Accounts/{}/Messages.json", self.base_url, account.account_sid);
        let response = self
            .client
            .post(url)
            .basic_auth(&account.account_sid, Some(&account.auth_token))
            .form(&[
                ("From", message.from.as_str()),
                ("To", message.to.as_str()),
                ("Body", message.body.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let reason = body.get("message").and_then(Value::as_str).unwrap_or("message rejected");
            return Err(StepError::provider(format!("Twilio: {} ({})", reason, status)));
        }

        body.get("sid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StepError::provider("Twilio response carried no message sid"))
    }
}

/// SMTP relay via lettre
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    relay: String,
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, account: &MailAccount, message: MailMessage) -> Result<String, StepError> {
        let from: Mailbox = account
            .user
            .parse()
            .map_err(|e| StepError::config(format!("invalid sender '{}': {}", account.user, e)))?;

        let mut builder = Message::builder().from(from).subject(message.subject);
        for recipient in &message.to {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|e| StepError::provider(format!("invalid recipient '{}': {}", recipient, e)))?;
            builder = builder.to(mailbox);
        }
        let email = builder
            .body(message.body)
            .map_err(|e| StepError::provider(format!("failed to build email: {}", e)))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.relay)
            .map_err(|e| StepError::provider(format!("SMTP relay '{}': {}", self.relay, e)))?
            .credentials(Credentials::new(account.user.clone(), account.pass.clone()))
            .build();

        let response = mailer
            .send(email)
            .await
            .map_err(|e| StepError::provider(format!("SMTP send failed: {}", e)))?;
        Ok(response.code().to_string())
    }
}
