/// Messaging step handlers: WhatsApp, Slack, Gmail and Discord
///
/// All four accept either a single item or a list of items as input. For a
/// list, each item is sent independently and a failing item becomes an
/// `{"status": "error", ...}` entry in the aggregate instead of failing the
/// step. For a single item, a send error fails the step.
///
/// Templated fields are resolved per item, so `{{input.email}}` refers to the
/// item being sent. Without provider credentials the handlers return a
/// `{"status": "simulated", ...}` record instead of calling out.

use crate::error::StepError;
use crate::runtime::providers::{HttpRequest, MailAccount, MailMessage, Providers, SmsAccount, SmsMessage};
use crate::runtime::template::{resolve_opt, NodeOutputs};
use crate::workflow::step::{non_empty, DiscordConfig, GmailConfig, SlackConfig, WhatsappConfig};
use serde_json::{json, Value};
use std::future::Future;

/// Send to every item of a list input, or once for a single input
pub(crate) async fn for_each_item<'a, F, Fut>(input: &'a Value, send: F) -> Result<Value, StepError>
where
    F: Fn(&'a Value) -> Fut,
    Fut: Future<Output = Result<Value, StepError>>,
{
    let Value::Array(items) = input else {
        return send(input).await;
    };

    tracing::debug!("📦 Batch send over {} items", items.len());
    let mut results = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match send(item).await {
            Ok(result) => results.push(result),
            Err(e) => {
                tracing::warn!("⚠️ Item {} of {} failed: {}", i + 1, items.len(), e);
                results.push(json!({ "status": "error", "error": e.to_string(), "item": item }));
            }
        }
    }

    Ok(json!({
        "message": format!("Processed {} messages", results.len()),
        "results": results,
    }))
}

pub(crate) async fn send_whatsapp(
    providers: &Providers,
    config: &WhatsappConfig,
    item: &Value,
    outputs: &NodeOutputs,
) -> Result<Value, StepError> {
    let to = resolve_opt(config.to.as_deref(), item, outputs);
    let message = resolve_opt(config.message.as_deref(), item, outputs);
    if to.trim().is_empty() {
        return Err(StepError::config("Missing 'To' number after resolving variables"));
    }

    let (Some(account_sid), Some(auth_token)) = (non_empty(&config.account_sid), non_empty(&config.auth_token)) else {
        tracing::info!("📱 WhatsApp to {} simulated (no Twilio credentials)", to);
        return Ok(json!({ "status": "simulated", "to": to, "message": message }));
    };

    let account = SmsAccount {
        account_sid: account_sid.to_string(),
        auth_token: auth_token.to_string(),
    };
    let sid = providers
        .sms
        .send(&account, SmsMessage {
            from: config.from.clone().unwrap_or_default(),
            to: to.clone(),
            body: message,
        })
        .await?;

    tracing::info!("📱 WhatsApp sent to {} (sid {})", to, sid);
    Ok(json!({ "status": "sent", "sid": sid, "to": to }))
}

pub(crate) async fn send_slack(
    providers: &Providers,
    config: &SlackConfig,
    item: &Value,
    outputs: &NodeOutputs,
) -> Result<Value, StepError> {
    let message = resolve_opt(config.message.as_deref(), item, outputs);
    let channel = config.channel.clone().unwrap_or_default();

    let Some(webhook_url) = non_empty(&config.webhook_url) else {
        tracing::info!("💬 Slack to {} simulated (no webhook URL)", channel);
        return Ok(json!({ "status": "simulated", "channel": channel, "message": message }));
    };

    let mut payload = json!({ "text": message });
    if !channel.is_empty() {
        payload["channel"] = Value::String(channel.clone());
    }
    post_webhook(providers, "Slack", webhook_url, payload).await?;

    Ok(json!({ "status": "sent", "channel": channel }))
}

pub(crate) async fn send_gmail(
    providers: &Providers,
    config: &GmailConfig,
    item: &Value,
    outputs: &NodeOutputs,
) -> Result<Value, StepError> {
    let to = resolve_opt(config.to.as_deref(), item, outputs);
    let subject = resolve_opt(config.subject.as_deref(), item, outputs);
    let body = resolve_opt(config.body.as_deref(), item, outputs);

    let recipients: Vec<String> = to
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    if recipients.is_empty() {
        return Err(StepError::config("No recipients defined"));
    }

    let (Some(user), Some(pass)) = (non_empty(&config.user), non_empty(&config.pass)) else {
        tracing::info!("📧 Email to {} simulated (no SMTP credentials)", to);
        return Ok(json!({ "status": "simulated", "to": to, "subject": subject }));
    };

    let account = MailAccount { user: user.to_string(), pass: pass.to_string() };
    let reply = providers
        .mail
        .send(&account, MailMessage { to: recipients, subject, body })
        .await?;

    tracing::info!("📧 Email sent to {}", to);
    Ok(json!({ "status": "sent", "reply": reply, "to": to }))
}

/// Discord requires a webhook URL; its absence is checked before any item is sent
pub(crate) async fn send_discord(
    providers: &Providers,
    webhook_url: &str,
    config: &DiscordConfig,
    item: &Value,
    outputs: &NodeOutputs,
) -> Result<Value, StepError> {
    let content = resolve_opt(config.content.as_deref(), item, outputs);
    post_webhook(providers, "Discord", webhook_url, json!({ "content": content })).await?;
    Ok(json!({ "status": "sent" }))
}

async fn post_webhook(providers: &Providers, service: &str, url: &str, payload: Value) -> Result<(), StepError> {
    let response = providers.http.send(HttpRequest::post_json(url, payload)).await?;
    if !response.is_success() {
        return Err(StepError::provider(format!(
            "{} webhook responded with status {}",
            service, response.status
        )));
    }
    Ok(())
}
