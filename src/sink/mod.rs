//! Persistence sinks for audit records.
//!
//! One sink serves one audit domain. The writer is generic over this
//! trait, so divergent per-domain storage backends share a single
//! batching engine.

mod error;
mod memory;
mod schema;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::entry::AuditRecord;

pub use error::SinkError;
pub use memory::MemorySink;
pub use schema::{SCHEMA, SCHEMA_VERSION};
pub use sqlite::{default_audit_path, SqliteSink};

/// Persistence backend for one audit domain.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    /// Persist a single record, returning its generated identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    async fn create(&self, record: &AuditRecord) -> Result<i64, SinkError>;

    /// Persist all records or fail the whole call.
    ///
    /// Atomicity of the underlying store is the sink's concern; callers
    /// treat any error as "none of the batch is known to be durable".
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be persisted.
    async fn create_batch(&self, records: &[AuditRecord]) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: AuditSink + ?Sized> AuditSink for Arc<S> {
    async fn create(&self, record: &AuditRecord) -> Result<i64, SinkError> {
        (**self).create(record).await
    }

    async fn create_batch(&self, records: &[AuditRecord]) -> Result<(), SinkError> {
        (**self).create_batch(records).await
    }
}
