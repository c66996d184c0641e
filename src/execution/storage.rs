/// SQLite persistence for run records
///
/// The orchestrator is the only writer of a run. It creates the row once and
/// rewrites it after every step; step logs and the outcome are JSON columns.

use crate::execution::types::{Run, RunStatus};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};

/// Durable run store used by the orchestrator and the API layer
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a new run
    async fn create(&self, run: &Run) -> Result<()>;
    /// Overwrite status, outcome, logs and finish time of an existing run
    async fn save(&self, run: &Run) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Run>>;
    /// Runs of one workflow, newest first
    async fn list_for_workflow(&self, workflow_id: &str) -> Result<Vec<Run>>;
}

#[derive(Debug, Clone)]
pub struct ExecutionStorage {
    pool: SqlitePool,
}

impl ExecutionStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the executions table. Safe to call multiple times.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                outcome JSON,
                step_logs JSON NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_executions_workflow
            ON executions(workflow_id, started_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_run(row: SqliteRow) -> Result<Run> {
        let status: String = row.get("status");
        let outcome: Option<String> = row.get("outcome");
        let step_logs: String = row.get("step_logs");
        let started_at: String = row.get("started_at");
        let finished_at: Option<String> = row.get("finished_at");

        Ok(Run {
            id: row.get("id"),
            workflow_id: row.get("workflow_id"),
            user_id: row.get("user_id"),
            status: status.parse::<RunStatus>()?,
            outcome: outcome.map(|o| serde_json::from_str(&o)).transpose()?,
            step_logs: serde_json::from_str(&step_logs)?,
            started_at: parse_time(&started_at)?,
            finished_at: finished_at.as_deref().map(parse_time).transpose()?,
        })
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

#[async_trait]
impl RunStore for ExecutionStorage {
    async fn create(&self, run: &Run) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO executions (id, workflow_id, user_id, status, outcome, step_logs, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.workflow_id)
        .bind(&run.user_id)
        .bind(run.status.as_str())
        .bind(run.outcome.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&run.step_logs)?)
        .bind(run.started_at.to_rfc3339())
        .bind(run.finished_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save(&self, run: &Run) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = ?, outcome = ?, step_logs = ?, finished_at = ?
            WHERE id = ?
            "#,
        )
        .bind(run.status.as_str())
        .bind(run.outcome.as_ref().map(serde_json::to_string).transpose()?)
        .bind(serde_json::to_string(&run.step_logs)?)
        .bind(run.finished_at.map(|t| t.to_rfc3339()))
        .bind(&run.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Run not found: {}", run.id));
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Run>> {
        sqlx::query("SELECT * FROM executions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_run)
            .transpose()
    }

    async fn list_for_workflow(&self, workflow_id: &str) -> Result<Vec<Run>> {
        sqlx::query("SELECT * FROM executions WHERE workflow_id = ? ORDER BY started_at DESC")
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Self::row_to_run)
            .collect()
    }
}
