//! Bundled SQLite sink with async operations via `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use super::error::SinkError;
use super::schema::SCHEMA;
use super::AuditSink;
use crate::entry::AuditRecord;

/// Returns the default path for the audit database.
///
/// This is `~/.local/share/audit-relay/audit.db` on Unix systems.
#[must_use]
pub fn default_audit_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("audit-relay")
        .join("audit.db")
}

/// SQLite-backed persistence sink for one audit domain.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteSink {
    /// Open a sink at the specified path.
    ///
    /// Creates parent directories if they don't exist and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    SinkError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, SinkError> {
            let conn = Connection::open(&path_clone).map_err(|source| SinkError::DatabaseOpen {
                path: path_clone,
                source,
            })?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| SinkError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory sink for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or the schema cannot be applied.
    pub async fn open_in_memory() -> Result<Self, SinkError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, SinkError> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| SinkError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Returns the path to the database, if opened from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Count persisted records.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn count_records(&self) -> Result<u64, SinkError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<u64, SinkError> {
            let conn = conn.blocking_lock();
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM audit_records", [], |row| row.get(0))?;
            Ok(count.unsigned_abs())
        })
        .await
        .map_err(|_| SinkError::TaskCancelled)?
    }
}

const INSERT_SQL: &str = "INSERT INTO audit_records \
     (actor_profile_id, subject_id, action, target_table, record_id, old_data, new_data, context, reason, created_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

fn insert_record(conn: &Connection, record: &AuditRecord) -> Result<i64, SinkError> {
    conn.execute(
        INSERT_SQL,
        params![
            record.actor_profile_id.map(|id| id.to_string()),
            record.subject_id.map(|id| id.to_string()),
            record.action.as_str(),
            record.target_table,
            record.record_id,
            record.old_data,
            record.new_data,
            record.context,
            record.reason,
            record.created_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[async_trait]
impl AuditSink for SqliteSink {
    async fn create(&self, record: &AuditRecord) -> Result<i64, SinkError> {
        let record = record.clone();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<i64, SinkError> {
            let conn = conn.blocking_lock();
            insert_record(&conn, &record)
        })
        .await
        .map_err(|_| SinkError::TaskCancelled)?
    }

    async fn create_batch(&self, records: &[AuditRecord]) -> Result<(), SinkError> {
        let records = records.to_vec();
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), SinkError> {
            let mut conn = conn.blocking_lock();
            let tx = conn.transaction()?;
            for record in &records {
                insert_record(&tx, record)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(|_| SinkError::TaskCancelled)?
    }
}
