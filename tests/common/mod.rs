//! Shared fixtures: mock providers, a recording run store and an engine
//! harness over an in-memory database.

#![allow(dead_code)]

use async_trait::async_trait;
use flowforge::config::SandboxConfig;
use flowforge::credentials::CredentialResolver;
use flowforge::database::Database;
use flowforge::error::StepError;
use flowforge::execution::{Run, RunStore};
use flowforge::runtime::providers::{
    CompletionProvider, CompletionRequest, HttpRequest, HttpResponse, HttpTransport, MailAccount, MailMessage,
    MailTransport, Providers, SmsAccount, SmsMessage, SmsProvider,
};
use flowforge::runtime::{ExecutionEngine, LuaSandbox, NodeExecutor};
use flowforge::workflow::{Link, Step, Workflow};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// HTTP transport that records requests and replays queued responses
#[derive(Default)]
pub struct MockHttp {
    pub requests: Mutex<Vec<HttpRequest>>,
    pub responses: Mutex<VecDeque<HttpResponse>>,
}

impl MockHttp {
    pub fn respond(&self, status: u16, body: Value) {
        self.responses.lock().unwrap().push_back(HttpResponse { status, body });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StepError> {
        self.requests.lock().unwrap().push(request);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(HttpResponse { status: 200, body: json!({}) }))
    }
}

/// Completion provider answering with a fixed text
pub struct MockCompletions {
    pub reply: String,
    pub calls: Mutex<Vec<(String, CompletionRequest)>>,
}

impl MockCompletions {
    pub fn replying(reply: &str) -> Self {
        Self { reply: reply.to_string(), calls: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl CompletionProvider for MockCompletions {
    async fn complete(&self, api_key: &str, request: CompletionRequest) -> Result<Option<String>, StepError> {
        self.calls.lock().unwrap().push((api_key.to_string(), request));
        Ok(Some(self.reply.clone()))
    }
}

/// SMS provider that rejects numbers containing "000"
#[derive(Default)]
pub struct MockSms {
    pub sent: Mutex<Vec<SmsMessage>>,
}

#[async_trait]
impl SmsProvider for MockSms {
    async fn send(&self, _account: &SmsAccount, message: SmsMessage) -> Result<String, StepError> {
        if message.to.contains("000") {
            return Err(StepError::provider(format!("Twilio: invalid number {}", message.to)));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message);
        Ok(format!("SM{}", sent.len()))
    }
}

#[derive(Default)]
pub struct MockMail {
    pub sent: Mutex<Vec<MailMessage>>,
}

#[async_trait]
impl MailTransport for MockMail {
    async fn send(&self, _account: &MailAccount, message: MailMessage) -> Result<String, StepError> {
        self.sent.lock().unwrap().push(message);
        Ok("250".to_string())
    }
}

/// Run store wrapper remembering how many log entries each save carried
pub struct RecordingStore {
    inner: Arc<dyn RunStore>,
    pub saved_log_lengths: Mutex<Vec<usize>>,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn RunStore>) -> Self {
        Self { inner, saved_log_lengths: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl RunStore for RecordingStore {
    async fn create(&self, run: &Run) -> anyhow::Result<()> {
        self.inner.create(run).await
    }

    async fn save(&self, run: &Run) -> anyhow::Result<()> {
        self.saved_log_lengths.lock().unwrap().push(run.step_logs.len());
        self.inner.save(run).await
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Run>> {
        self.inner.get(id).await
    }

    async fn list_for_workflow(&self, workflow_id: &str) -> anyhow::Result<Vec<Run>> {
        self.inner.list_for_workflow(workflow_id).await
    }
}

/// Engine over an in-memory database with every provider mocked
pub struct Harness {
    pub db: Database,
    pub engine: ExecutionEngine,
    pub store: Arc<RecordingStore>,
    pub http: Arc<MockHttp>,
    pub completions: Arc<MockCompletions>,
    pub sms: Arc<MockSms>,
    pub mail: Arc<MockMail>,
    pub files: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_fallback_key(None).await
    }

    pub async fn with_fallback_key(fallback: Option<&str>) -> Self {
        let db = Database::in_memory().await.unwrap();
        let files = tempfile::tempdir().unwrap();

        let http = Arc::new(MockHttp::default());
        let completions = Arc::new(MockCompletions::replying("A short summary."));
        let sms = Arc::new(MockSms::default());
        let mail = Arc::new(MockMail::default());

        let providers = Providers {
            http: http.clone(),
            completions: completions.clone(),
            sms: sms.clone(),
            mail: mail.clone(),
        };
        let resolver = CredentialResolver::new(Arc::new(db.credentials()))
            .with_fallback("groq", fallback.map(str::to_string));
        let sandbox = LuaSandbox::new(&SandboxConfig { time_budget_ms: 1_000, memory_limit_bytes: 16 * 1024 * 1024 });
        let executor = Arc::new(NodeExecutor::new(providers, resolver, sandbox, files.path()));

        let store = Arc::new(RecordingStore::new(Arc::new(db.executions())));
        let engine = ExecutionEngine::new(executor, store.clone());

        Self { db, engine, store, http, completions, sms, mail, files }
    }

    pub fn saved_log_lengths(&self) -> Vec<usize> {
        self.store.saved_log_lengths.lock().unwrap().clone()
    }
}

pub fn step(id: &str, step_type: &str, data: Value) -> Step {
    Step { id: id.to_string(), step_type: step_type.to_string(), data, position: None }
}

pub fn link(source: &str, target: &str) -> Link {
    Link {
        id: format!("e-{source}-{target}"),
        source: source.to_string(),
        target: target.to_string(),
        extra: Default::default(),
    }
}

/// Workflow whose steps are linked in the given order
pub fn chain(steps: Vec<Step>) -> Workflow {
    let links = steps.windows(2).map(|w| link(&w[0].id, &w[1].id)).collect();
    workflow(steps, links)
}

pub fn workflow(steps: Vec<Step>, links: Vec<Link>) -> Workflow {
    Workflow {
        id: "wf-test".to_string(),
        name: "Test workflow".to_string(),
        owner_id: "owner-1".to_string(),
        steps,
        links,
    }
}
