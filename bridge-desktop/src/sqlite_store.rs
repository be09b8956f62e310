//! Persistent key-value storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{PersistentStore, StoreKind},
    time::{Clock, SystemClock},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

/// Default database location under the platform's local data directory.
///
/// `~/.local/share/<app>/session.db` on Linux, the equivalent application
/// support directory elsewhere. Falls back to the working directory when the
/// platform exposes no data directory.
pub fn default_database_path(app_name: &str) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(app_name)
        .join("session.db")
}

/// SQLite-backed persistent store
///
/// The native counterpart of the browser's `localStorage`: values survive
/// restarts and are shared by every context that opens the same file.
pub struct SqliteStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(BridgeError::Io)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            BridgeError::StorageUnavailable(format!("Failed to open session database: {}", e))
        })?;

        Self::init_schema(&pool).await?;
        debug!(path = ?db_path, "Initialized session store");

        Ok(Self::with_pool(pool))
    }

    /// In-memory database, private to this instance.
    pub async fn in_memory() -> Result<Self> {
        // Every pooled connection to `:memory:` would get its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                BridgeError::StorageUnavailable(format!("Failed to open in-memory database: {}", e))
            })?;

        Self::init_schema(&pool).await?;
        Ok(Self::with_pool(pool))
    }

    fn with_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp `updated_at` with `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    /// Release the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to read key: {}", e)))?;

        Ok(row.map(|row| row.get::<String, _>(0)))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(self.clock.unix_timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::StorageUnavailable(format!("Failed to write key: {}", e)))?;

        debug!(key = key, "Stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageUnavailable(format!("Failed to remove key: {}", e)))?;

        debug!(key = key, "Removed value");
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Persistent
    }
}
