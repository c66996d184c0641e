//! HTTP surface tests against a server bound to an ephemeral port.

mod common;

use common::{MockCompletions, MockHttp, MockMail, MockSms};
use flowforge::config::Config;
use flowforge::database::Database;
use flowforge::runtime::Providers;
use flowforge::server::{build_state, router};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

struct TestServer {
    base: String,
    client: reqwest::Client,
    _files: tempfile::TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let files = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.files_dir = files.path().to_string_lossy().into_owned();
        config.providers.groq_fallback_api_key = None;

        let db = Database::in_memory().await.unwrap();
        let providers = Providers {
            http: Arc::new(MockHttp::default()),
            completions: Arc::new(MockCompletions::replying("ok")),
            sms: Arc::new(MockSms::default()),
            mail: Arc::new(MockMail::default()),
        };
        let app = router(build_state(&config, &db, providers));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });

        Self { base: format!("http://{addr}"), client: reqwest::Client::new(), _files: files }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn create_workflow(&self, user: &str, workflow: Value) -> String {
        let response = self
            .client
            .post(self.url("/api/workflows"))
            .header("X-User-Id", user)
            .json(&json!({ "workflow": workflow }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }
}

fn two_step_workflow() -> Value {
    json!({
        "name": "Greeter",
        "nodes": [
            {"id": "trigger", "type": "manualTrigger", "data": {}},
            {"id": "hook", "type": "webhookTrigger", "data": {}},
            {"id": "greet", "type": "code", "data": {"code": "output.greeting = 'hi ' .. (input.name or 'there')"}}
        ],
        "edges": [
            {"id": "e1", "source": "trigger", "target": "greet"},
            {"id": "e2", "source": "hook", "target": "greet"}
        ]
    })
}

#[tokio::test]
async fn health_check_answers_ok() {
    let server = TestServer::start().await;
    let body = server.client.get(server.url("/healthz")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn workflows_are_scoped_to_their_owner() {
    let server = TestServer::start().await;
    let id = server.create_workflow("alice", two_step_workflow()).await;

    let list: Value = server
        .client
        .get(server.url("/api/workflows"))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["workflows"].as_array().unwrap().len(), 1);

    let as_bob = server
        .client
        .get(server.url(&format!("/api/workflows/{id}")))
        .header("X-User-Id", "bob")
        .send()
        .await
        .unwrap();
    assert_eq!(as_bob.status(), StatusCode::NOT_FOUND);

    let fetched: Value = server
        .client
        .get(server.url(&format!("/api/workflows/{id}")))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["name"], "Greeter");
    assert_eq!(fetched["nodes"].as_array().unwrap().len(), 3);

    let deleted = server
        .client
        .delete(server.url(&format!("/api/workflows/{id}")))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
}

#[tokio::test]
async fn manual_run_is_recorded_and_queryable() {
    let server = TestServer::start().await;
    let id = server.create_workflow("alice", two_step_workflow()).await;

    let started: Value = server
        .client
        .post(server.url(&format!("/api/workflows/{id}/run")))
        .header("X-User-Id", "alice")
        .json(&json!({"name": "Ada"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(started["status"], "completed");
    let execution_id = started["execution_id"].as_str().unwrap();

    let run: Value = server
        .client
        .get(server.url(&format!("/api/execution-details/{execution_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(run["status"], "completed");
    assert_eq!(run["user_id"], "alice");
    assert_eq!(run["step_logs"][1]["output"], json!({"greeting": "hi Ada"}));

    let history: Vec<Value> = server
        .client
        .get(server.url(&format!("/api/executions/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 1);

    let missing = server.client.get(server.url("/api/execution-details/nope")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_acknowledges_and_runs_in_background() {
    let server = TestServer::start().await;
    let id = server.create_workflow("alice", two_step_workflow()).await;

    let ack: Value = server
        .client
        .post(server.url(&format!("/webhook/{id}")))
        .json(&json!({"name": "Hook"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ack["data"], json!({"name": "Hook"}));

    let mut history: Vec<Value> = Vec::new();
    for _ in 0..50 {
        history = server
            .client
            .get(server.url(&format!("/api/executions/{id}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if history.first().is_some_and(|r| r["status"] != "running") {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(history[0]["status"], "completed");
    assert_eq!(history[0]["user_id"], "alice");
    assert_eq!(history[0]["step_logs"][0]["step_id"], "hook");

    let unknown = server.client.post(server.url("/webhook/unknown")).json(&json!({})).send().await.unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn credential_values_never_leave_the_server() {
    let server = TestServer::start().await;

    let created = server
        .client
        .post(server.url("/api/credentials"))
        .header("X-User-Id", "alice")
        .json(&json!({"service": "groq", "name": "default", "value": "sk-secret"}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::OK);
    let summary: Value = created.json().await.unwrap();
    assert!(summary.get("value").is_none());
    let credential_id = summary["id"].as_str().unwrap().to_string();

    let listed = server
        .client
        .get(server.url("/api/credentials"))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!listed.contains("sk-secret"));
    assert!(listed.contains("groq"));

    let by_bob = server
        .client
        .delete(server.url(&format!("/api/credentials/{credential_id}")))
        .header("X-User-Id", "bob")
        .send()
        .await
        .unwrap();
    assert_eq!(by_bob.status(), StatusCode::NOT_FOUND);

    let by_alice = server
        .client
        .delete(server.url(&format!("/api/credentials/{credential_id}")))
        .header("X-User-Id", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(by_alice.status(), StatusCode::OK);
}
