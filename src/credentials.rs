/// Per-user provider credentials
///
/// Steps that call AI providers look up the invoking user's key here. When the
/// user has none stored, a system-wide fallback from configuration applies.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePool, Row};
use std::collections::HashMap;
use std::sync::Arc;

/// Secret lookup used by the dispatcher
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup(&self, service: &str, user_id: &str) -> Result<Option<String>>;
}

/// Stored credential without its secret value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: String,
    pub service: String,
    pub name: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CredentialStorage {
    pool: SqlitePool,
}

impl CredentialStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                id TEXT PRIMARY KEY,
                service TEXT NOT NULL,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(service, name, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert, or replace the value of the user's credential with the same service and name
    pub async fn upsert(&self, service: &str, name: &str, value: &str, user_id: &str) -> Result<CredentialSummary> {
        sqlx::query(
            r#"
            INSERT INTO credentials (id, service, name, value, user_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(service, name, user_id) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(service)
        .bind(name)
        .bind(value)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, service, name, user_id, created_at FROM credentials WHERE service = ? AND name = ? AND user_id = ?",
        )
        .bind(service)
        .bind(name)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary(&row))
    }

    /// The user's credentials, values hidden
    pub async fn list(&self, user_id: &str) -> Result<Vec<CredentialSummary>> {
        let rows = sqlx::query(
            "SELECT id, service, name, user_id, created_at FROM credentials WHERE user_id = ? ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(summary).collect())
    }

    /// Delete a credential, only if it belongs to `user_id`
    pub async fn delete(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM credentials WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn summary(row: &sqlx::sqlite::SqliteRow) -> CredentialSummary {
    CredentialSummary {
        id: row.get("id"),
        service: row.get("service"),
        name: row.get("name"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl CredentialStore for CredentialStorage {
    async fn lookup(&self, service: &str, user_id: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT value FROM credentials WHERE service = ? AND user_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(service)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("value")))
    }
}

/// Store lookup with a per-service fallback secret
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    fallbacks: HashMap<String, String>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store, fallbacks: HashMap::new() }
    }

    /// Secret used when a user has no stored value for `service`
    pub fn with_fallback(mut self, service: &str, secret: Option<String>) -> Self {
        if let Some(secret) = secret {
            self.fallbacks.insert(service.to_string(), secret);
        }
        self
    }

    pub async fn resolve(&self, service: &str, user_id: &str) -> Result<Option<String>> {
        if let Some(secret) = self.store.lookup(service, user_id).await? {
            return Ok(Some(secret));
        }
        tracing::debug!("🔐 No '{}' credential for user {}, trying fallback", service, user_id);
        Ok(self.fallbacks.get(service).cloned())
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("fallback_services", &self.fallbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}
