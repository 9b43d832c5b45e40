//! SQLite sink
//!
//! The stasher is a plain OS thread, so the sink drives sqlx on a private
//! current-thread runtime instead of borrowing the CLI's.

use super::{Sink, StorageRecord};
use crate::error::StorageError;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;
use tokio::runtime::{Builder, Runtime};

struct Connection {
    runtime: Runtime,
    pool: SqlitePool,
}

/// One row per record in a fixed-schema table indexed by content id
pub struct DatabaseSink {
    path: PathBuf,
    table: String,
    connection: Option<Connection>,
}

impl DatabaseSink {
    /// `table` must be a plain identifier; configuration validation enforces this
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
            connection: None,
        }
    }

    fn open_error(&self, reason: impl ToString) -> StorageError {
        StorageError::Open {
            target: format!("sqlite:{}", self.path.display()),
            reason: reason.to_string(),
        }
    }
}

impl Sink for DatabaseSink {
    fn open(&mut self) -> Result<(), StorageError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| self.open_error(e))?;

        let db_url = format!("sqlite:{}?mode=rwc", self.path.display());
        let create_table = format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                tree TEXT NOT NULL,
                script TEXT NOT NULL,
                "binary" TEXT NOT NULL,
                file_name TEXT NOT NULL
            )"#,
            table = self.table
        );
        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_content_id ON {table} (content_id)",
            table = self.table
        );

        let pool = runtime
            .block_on(async {
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect(&db_url)
                    .await?;
                sqlx::query(&create_table).execute(&pool).await?;
                sqlx::query(&create_index).execute(&pool).await?;
                Ok::<_, sqlx::Error>(pool)
            })
            .map_err(|e| self.open_error(e))?;

        tracing::info!(path = %self.path.display(), table = %self.table, "Connected to database");
        self.connection = Some(Connection { runtime, pool });
        Ok(())
    }

    fn store(&mut self, record: &StorageRecord) -> Result<(), StorageError> {
        let connection = self.connection.as_ref().ok_or(StorageError::NotOpen)?;
        let insert = format!(
            r#"INSERT INTO {} (content_id, fingerprint, tree, script, "binary", file_name)
               VALUES (?, ?, ?, ?, ?, ?)"#,
            self.table
        );

        connection
            .runtime
            .block_on(
                sqlx::query(&insert)
                    .bind(record.content_id.as_str())
                    .bind(record.fingerprint.as_str())
                    .bind(record.tree.as_str())
                    .bind(record.script.as_str())
                    .bind(record.binary.as_str())
                    .bind(record.file_name.as_str())
                    .execute(&connection.pool),
            )
            .map_err(|e| StorageError::Store {
                content_id: record.content_id.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if let Some(connection) = self.connection.take() {
            connection.runtime.block_on(connection.pool.close());
            tracing::debug!(path = %self.path.display(), "Closed database");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}
