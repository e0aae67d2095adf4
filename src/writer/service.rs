//! The audit writer service: intake surface and lifecycle controller.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::SendTimeoutError, Sender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::entry::{AuditEntry, AuditRecord};
use crate::sink::AuditSink;

use super::batch::BatchWriter;
use super::config::WriterConfig;
use super::worker::Worker;

/// Asynchronous audit-trail writer for one audit domain.
///
/// An explicitly owned service instance: construct one per sink, inject
/// it where audit entries are produced, and drive it through [`start`]
/// and [`stop`]. Handles are cheap to clone and share one underlying
/// service.
///
/// No failure in this writer is ever surfaced to the caller or allowed
/// to fail the business operation it records; durability is strictly
/// best-effort.
///
/// [`start`]: AuditWriter::start
/// [`stop`]: AuditWriter::stop
pub struct AuditWriter<S: AuditSink> {
    inner: Arc<Inner<S>>,
}

impl<S: AuditSink> Clone for AuditWriter<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S: AuditSink> {
    sink: Arc<S>,
    config: WriterConfig,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    running: bool,
    tx: Option<Sender<AuditRecord>>,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl<S: AuditSink> AuditWriter<S> {
    /// Create a stopped writer over the given sink.
    #[must_use]
    pub fn new(sink: S, config: WriterConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink: Arc::new(sink),
                config,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Returns the writer configuration.
    #[must_use]
    pub fn config(&self) -> &WriterConfig {
        &self.inner.config
    }

    /// Whether the writer is currently accepting entries.
    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    /// Launch the consumer worker. Idempotent: a concurrent or repeated
    /// call while already running is a no-op.
    pub async fn start(&self) {
        let mut state = self.inner.state.lock().await;
        if state.running {
            tracing::debug!(domain = %self.inner.config.domain, "Audit writer already running");
            return;
        }

        let (tx, rx) = mpsc::channel(self.inner.config.queue_capacity.max(1));
        let cancel = CancellationToken::new();
        let writer = BatchWriter::new(Arc::clone(&self.inner.sink), &self.inner.config);
        let worker = Worker::new(rx, writer, cancel.clone(), &self.inner.config);

        state.tx = Some(tx);
        state.cancel = Some(cancel);
        state.handle = Some(tokio::spawn(worker.run()));
        state.running = true;

        tracing::info!(
            domain = %self.inner.config.domain,
            queue_capacity = self.inner.config.queue_capacity,
            batch_size = self.inner.config.batch_size,
            "Audit writer started"
        );
    }

    /// Signal shutdown, stop further intake, and wait for the worker to
    /// drain and exit, bounded by the shutdown timeout.
    ///
    /// Exceeding the timeout logs a diagnostic but still returns control;
    /// shutdown never hangs the host process. Idempotent.
    pub async fn stop(&self) {
        let handle = {
            let mut state = self.inner.state.lock().await;
            if !state.running {
                tracing::debug!(domain = %self.inner.config.domain, "Audit writer already stopped");
                return;
            }
            state.running = false;
            // Closing the channel lets the drain observe end-of-queue.
            state.tx = None;
            if let Some(cancel) = state.cancel.take() {
                cancel.cancel();
            }
            state.handle.take()
        };

        let Some(handle) = handle else { return };
        match tokio::time::timeout(self.inner.config.shutdown_timeout(), handle).await {
            Ok(Ok(())) => {
                tracing::info!(domain = %self.inner.config.domain, "Audit writer stopped");
            }
            Ok(Err(error)) => {
                tracing::error!(
                    domain = %self.inner.config.domain,
                    error = %error,
                    "Audit worker terminated abnormally"
                );
            }
            Err(_) => {
                tracing::error!(
                    domain = %self.inner.config.domain,
                    timeout_ms = self.inner.config.shutdown_timeout_ms,
                    "Audit writer shutdown timed out"
                );
            }
        }
    }

    /// Record one audit entry.
    ///
    /// Critical actions are written synchronously through the sink,
    /// bypassing the queue; everything else is converted to storage form
    /// and enqueued with a short bounded wait. On queue-full, timeout, or
    /// a stopped writer the entry is dropped with one diagnostic. Never
    /// blocks indefinitely and never returns an error.
    pub async fn log(&self, entry: AuditEntry) {
        if !entry.is_persistable() {
            tracing::debug!(
                domain = %self.inner.config.domain,
                action = entry.action.as_str(),
                table = %entry.target_table,
                "Audit entry not persistable, skipped"
            );
            return;
        }

        let tx = {
            let state = self.inner.state.lock().await;
            if state.running {
                state.tx.clone()
            } else {
                None
            }
        };
        let Some(tx) = tx else {
            tracing::error!(
                domain = %self.inner.config.domain,
                action = entry.action.as_str(),
                table = %entry.target_table,
                record_id = %entry.record_id,
                "Audit writer not running, entry dropped"
            );
            return;
        };

        if entry.action.is_critical() {
            self.write_critical(entry).await;
            return;
        }

        let record = AuditRecord::from(entry);
        match tx
            .send_timeout(record, self.inner.config.enqueue_timeout())
            .await
        {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(record) | SendTimeoutError::Closed(record)) => {
                tracing::error!(
                    domain = %self.inner.config.domain,
                    action = record.action.as_str(),
                    table = %record.target_table,
                    record_id = %record.record_id,
                    "Audit queue full, entry dropped"
                );
            }
        }
    }

    /// Record one audit entry without holding up the calling request.
    ///
    /// The entry is structurally copied here, before it crosses onto the
    /// asynchronous path: the caller may mutate or discard its own entry
    /// immediately after this returns without affecting what is
    /// persisted.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn log_async(&self, entry: &AuditEntry) {
        let entry = entry.clone();
        let writer = self.clone();
        tokio::spawn(async move {
            writer.log(entry).await;
        });
    }

    /// Synchronous fast path for the critical-action allow-list: one
    /// immediate single-item write, stronger durability for high-impact
    /// operations at the cost of caller latency.
    async fn write_critical(&self, entry: AuditEntry) {
        let record = AuditRecord::from(entry);
        match self.inner.sink.create(&record).await {
            Ok(_) => {
                tracing::debug!(
                    domain = %self.inner.config.domain,
                    action = record.action.as_str(),
                    table = %record.target_table,
                    record_id = %record.record_id,
                    "Critical audit entry persisted"
                );
            }
            Err(error) => {
                tracing::error!(
                    domain = %self.inner.config.domain,
                    action = record.action.as_str(),
                    table = %record.target_table,
                    record_id = %record.record_id,
                    error = %error,
                    "Critical audit write failed"
                );
            }
        }
    }
}
