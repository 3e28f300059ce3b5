//! Named JSON documents grouped into collections

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, name: &str) -> Result<Option<Value>>;

    /// Insert the document, replacing any existing one with the same name
    async fn upsert(&self, collection: &str, name: &str, document: &Value) -> Result<()>;
}

/// Documents in a single SQLite table keyed by (collection, name)
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Connect to `database_url` (e.g. `sqlite://data/opsync.db`), creating
    /// the database file and schema when missing.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {database_url}"))?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await
            .context("Failed to enable WAL mode")?;

        Self::from_pool(pool).await
    }

    /// Each in-memory connection is its own database, so the pool holds one.
    pub async fn connect_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to connect to in-memory database")?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                name TEXT NOT NULL,
                document TEXT NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (collection, name)
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create documents table")?;

        log::debug!("Document store ready");
        Ok(Self { pool })
    }

    /// Names of every document in a collection
    pub async fn list(&self, collection: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM documents WHERE collection = ? ORDER BY name")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list collection '{collection}'"))?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find(&self, collection: &str, name: &str) -> Result<Option<Value>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT document FROM documents WHERE collection = ? AND name = ?")
            .bind(collection)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to get document '{collection}/{name}'"))?;

        row.map(|(text,)| {
            serde_json::from_str(&text).with_context(|| format!("Stored document '{collection}/{name}' is not JSON"))
        })
        .transpose()
    }

    async fn upsert(&self, collection: &str, name: &str, document: &Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO documents (collection, name, document, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(collection)
        .bind(name)
        .bind(document.to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save document '{collection}/{name}'"))?;

        log::info!("Saved document: {collection}/{name}");
        Ok(())
    }
}

/// Process-local store, for dry runs and tests
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<(String, String), Value>>,
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, collection: &str, name: &str) -> Result<Option<Value>> {
        let documents = self.documents.lock().unwrap_or_else(|e| e.into_inner());
        Ok(documents.get(&(collection.to_string(), name.to_string())).cloned())
    }

    async fn upsert(&self, collection: &str, name: &str, document: &Value) -> Result<()> {
        let mut documents = self.documents.lock().unwrap_or_else(|e| e.into_inner());
        documents.insert((collection.to_string(), name.to_string()), document.clone());
        Ok(())
    }
}
