/// SQLite database handle
///
/// Opens the single connection pool shared by the workflow, execution and
/// credential stores, and initialises all of their schemas.

use crate::{
    credentials::CredentialStorage, execution::ExecutionStorage, workflow::storage::WorkflowStorage,
};
use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database file at `path`
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("Failed to create database directory '{}': {}", parent.display(), e))?;
        }

        tracing::info!("🗄️ Opening database: {}", path);
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let db = Self { pool };
        db.init_schemas().await?;
        Ok(db)
    }

    /// Private in-memory database, kept alive on a single connection
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.init_schemas().await?;
        Ok(db)
    }

    async fn init_schemas(&self) -> Result<()> {
        self.workflows().init_schema().await?;
        self.executions().init_schema().await?;
        self.credentials().init_schema().await?;
        Ok(())
    }

    pub fn workflows(&self) -> WorkflowStorage {
        WorkflowStorage::new(self.pool.clone())
    }

    pub fn executions(&self) -> ExecutionStorage {
        ExecutionStorage::new(self.pool.clone())
    }

    pub fn credentials(&self) -> CredentialStorage {
        CredentialStorage::new(self.pool.clone())
    }
}
