//! Batch persistence with retry, backoff, and per-item fallback.

use std::sync::Arc;
use std::time::Duration;

use crate::entry::AuditRecord;
use crate::sink::AuditSink;

use super::config::WriterConfig;

/// Persists accumulated batches to a sink.
///
/// A batch is first written with one bulk call, retried with exponential
/// backoff. Once bulk attempts are exhausted the batch degrades to a
/// best-effort per-item salvage pass rather than all-or-nothing loss.
pub struct BatchWriter<S> {
    sink: Arc<S>,
    domain: String,
    max_attempts: u32,
    retry_backoff: Duration,
    attempt_timeout: Duration,
}

impl<S: AuditSink> BatchWriter<S> {
    /// Create a batch writer over the given sink.
    pub fn new(sink: Arc<S>, config: &WriterConfig) -> Self {
        Self {
            sink,
            domain: config.domain.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff(),
            attempt_timeout: config.attempt_timeout(),
        }
    }

    /// Flush one batch. Infallible: every failure path ends in a diagnostic.
    pub async fn flush(&self, batch: Vec<AuditRecord>) {
        if batch.is_empty() {
            return;
        }

        if self.write_bulk(&batch).await {
            return;
        }
        self.salvage_per_item(&batch).await;
    }

    /// Bulk write with bounded retry. Returns whether the batch is durable.
    async fn write_bulk(&self, batch: &[AuditRecord]) -> bool {
        let mut backoff = self.retry_backoff;
        for attempt in 1..=self.max_attempts {
            match tokio::time::timeout(self.attempt_timeout, self.sink.create_batch(batch)).await {
                Ok(Ok(())) => {
                    tracing::debug!(
                        domain = %self.domain,
                        count = batch.len(),
                        attempt,
                        "Audit batch flushed"
                    );
                    return true;
                }
                Ok(Err(error)) => {
                    tracing::warn!(
                        domain = %self.domain,
                        count = batch.len(),
                        attempt,
                        error = %error,
                        "Bulk audit write failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        domain = %self.domain,
                        count = batch.len(),
                        attempt,
                        timeout = ?self.attempt_timeout,
                        "Bulk audit write timed out"
                    );
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
        }
        false
    }

    /// One persistence call per entry; an individual failure does not
    /// abort the remainder. Entries still failing here are dropped with
    /// a single summary diagnostic.
    async fn salvage_per_item(&self, batch: &[AuditRecord]) {
        let mut dropped = 0usize;
        for record in batch {
            let result = match tokio::time::timeout(self.attempt_timeout, self.sink.create(record))
                .await
            {
                Ok(result) => result.map(|_| ()),
                Err(_) => Err(crate::sink::SinkError::Unavailable(
                    "per-item write timed out".to_string(),
                )),
            };
            if let Err(error) = result {
                dropped += 1;
                tracing::error!(
                    domain = %self.domain,
                    action = record.action.as_str(),
                    table = %record.target_table,
                    record_id = %record.record_id,
                    error = %error,
                    "Audit record lost in per-item fallback"
                );
            }
        }

        if dropped > 0 {
            tracing::error!(
                domain = %self.domain,
                batch_size = batch.len(),
                dropped,
                "Audit batch failed after retries"
            );
        } else {
            tracing::debug!(
                domain = %self.domain,
                count = batch.len(),
                "Audit batch salvaged per item"
            );
        }
    }
}
