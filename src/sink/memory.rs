//! In-memory sink for tests and host-side fakes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::error::SinkError;
use super::AuditSink;
use crate::entry::AuditRecord;

/// Sink that keeps records in memory.
///
/// The counterpart of opening the SQLite sink in memory, without the
/// database: useful in unit tests and as a reference implementation of
/// the sink contract.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all persisted records, in persistence order.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }

    /// Number of persisted records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether no record has been persisted yet.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn create(&self, record: &AuditRecord) -> Result<i64, SinkError> {
        let mut records = self.records.lock().await;
        records.push(record.clone());
        Ok(i64::try_from(records.len()).unwrap_or(i64::MAX))
    }

    async fn create_batch(&self, records: &[AuditRecord]) -> Result<(), SinkError> {
        self.records.lock().await.extend_from_slice(records);
        Ok(())
    }
}
