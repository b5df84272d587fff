//! SQLite audit store
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers (the audit API) never block the check writers
//! - **Crash durable**: Every put is its own committed statement
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Layout
//!
//! `check_outputs` is keyed by `(check_name, run_key)`, which gives every
//! check its own ordered partition; `action_outputs` is keyed by
//! `action_key` alone. The full record is kept as JSON in `payload`, while
//! `status`, `rc` and `timestamp` are duplicated into columns for ad-hoc
//! queries.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{AuditStore, HealthStatus};
use super::error::{StorageError, StorageResult};
use super::schema::{action_key, check_key};
use crate::config::ActionMeta;
use crate::{ActionOutput, Output};

/// SQLite audit store
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Open (or create) the database at `db_path` and run migrations.
    ///
    /// ```no_run
    /// # use algowatch::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./algowatch.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // FULL: a committed audit record survives power loss
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn decode_output(row: &sqlx::sqlite::SqliteRow) -> StorageResult<Output> {
        let payload: String = row.get("payload");
        Ok(serde_json::from_str(&payload)?)
    }
}

#[async_trait]
impl AuditStore for SqliteBackend {
    #[instrument(skip(self, output))]
    async fn put_check(&self, check_name: &str, output: &Output) -> StorageResult<String> {
        let key = check_key(&output.timestamp);
        let payload = serde_json::to_string(output)?;

        sqlx::query(
            r#"
            INSERT INTO check_outputs (check_name, run_key, status, rc, timestamp, payload)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (check_name, run_key) DO UPDATE SET
                status = excluded.status,
                rc = excluded.rc,
                timestamp = excluded.timestamp,
                payload = excluded.payload
            "#,
        )
        .bind(check_name)
        .bind(&key)
        .bind(output.status.as_str())
        .bind(output.rc)
        .bind(output.timestamp.timestamp_millis())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        debug!("stored check output {check_name}/{key}");
        Ok(key)
    }

    #[instrument(skip(self))]
    async fn get_check(&self, check_name: &str, key: &str) -> StorageResult<Option<Output>> {
        let row = sqlx::query(
            "SELECT payload FROM check_outputs WHERE check_name = ? AND run_key = ?",
        )
        .bind(check_name)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::decode_output).transpose()
    }

    #[instrument(skip(self))]
    async fn list_check_names(&self) -> StorageResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT check_name FROM check_outputs ORDER BY check_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("check_name")).collect())
    }

    #[instrument(skip(self))]
    async fn list_check_outputs(
        &self,
        check_name: &str,
        limit: usize,
    ) -> StorageResult<Vec<Output>> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM check_outputs
            WHERE check_name = ?
            ORDER BY run_key ASC
            LIMIT ?
            "#,
        )
        .bind(check_name)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let outputs = rows
            .iter()
            .map(Self::decode_output)
            .collect::<StorageResult<Vec<_>>>()?;
        debug!("query returned {} outputs", outputs.len());
        Ok(outputs)
    }

    #[instrument(skip(self, action, output), fields(action = %action.name))]
    async fn put_action(
        &self,
        check_name: &str,
        action: &ActionMeta,
        output: &ActionOutput,
    ) -> StorageResult<String> {
        let key = action_key(check_name, &action.name, &output.timestamp);
        let payload = serde_json::to_string(output)?;

        sqlx::query(
            r#"
            INSERT INTO action_outputs (
                action_key, check_name, action_name, status, rc, timestamp, payload
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (action_key) DO UPDATE SET
                status = excluded.status,
                rc = excluded.rc,
                timestamp = excluded.timestamp,
                payload = excluded.payload
            "#,
        )
        .bind(&key)
        .bind(check_name)
        .bind(&action.name)
        .bind(output.status.as_str())
        .bind(output.rc)
        .bind(output.timestamp.timestamp_millis())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        debug!("stored action output {key}");
        Ok(key)
    }

    #[instrument(skip(self))]
    async fn get_action(&self, key: &str) -> StorageResult<Option<ActionOutput>> {
        let row = sqlx::query("SELECT payload FROM action_outputs WHERE action_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let payload: String = row.get("payload");
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
