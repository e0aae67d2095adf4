//! Single-consumer worker loop that accumulates and flushes batches.

use std::time::{Duration, Instant};

use tokio::sync::mpsc::Receiver;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::entry::AuditRecord;
use crate::sink::AuditSink;

use super::batch::BatchWriter;
use super::config::WriterConfig;

/// The single consumer behind an [`AuditWriter`](super::AuditWriter).
///
/// Reads continuously from the intake queue and flushes the in-memory
/// batch on three independent triggers: the batch reaching the size
/// threshold, the periodic timer firing with a non-empty batch, and the
/// shutdown signal.
pub(crate) struct Worker<S> {
    rx: Receiver<AuditRecord>,
    writer: BatchWriter<S>,
    cancel: CancellationToken,
    domain: String,
    batch_size: usize,
    flush_interval: Duration,
    drain_timeout: Duration,
    batch: Vec<AuditRecord>,
}

impl<S: AuditSink> Worker<S> {
    pub(crate) fn new(
        rx: Receiver<AuditRecord>,
        writer: BatchWriter<S>,
        cancel: CancellationToken,
        config: &WriterConfig,
    ) -> Self {
        Self {
            rx,
            writer,
            cancel,
            domain: config.domain.clone(),
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval(),
            drain_timeout: config.drain_timeout(),
            batch: Vec::with_capacity(config.batch_size),
        }
    }

    pub(crate) async fn run(mut self) {
        let start = tokio::time::Instant::now() + self.flush_interval;
        let mut ticker = tokio::time::interval_at(start, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    self.drain().await;
                    break;
                }

                _ = ticker.tick() => {
                    if !self.batch.is_empty() {
                        self.flush().await;
                    }
                }

                item = self.rx.recv() => match item {
                    Some(record) => {
                        self.batch.push(record);
                        if self.batch.len() >= self.batch_size {
                            self.flush().await;
                        }
                    }
                    // Intake side closed without a cancel signal.
                    None => break,
                }
            }
        }

        self.flush().await;
        tracing::info!(domain = %self.domain, "Audit worker stopped");
    }

    async fn flush(&mut self) {
        let batch = std::mem::take(&mut self.batch);
        self.writer.flush(batch).await;
    }

    /// Best-effort, time-bounded drain of entries still sitting in the
    /// queue at shutdown, so items accepted before `stop` are not lost
    /// outside the documented drop paths.
    async fn drain(&mut self) {
        let deadline = Instant::now() + self.drain_timeout;
        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                tracing::error!(
                    domain = %self.domain,
                    "Shutdown drain timed out, remaining queue entries dropped"
                );
                break;
            };
            match tokio::time::timeout(remaining, self.rx.recv()).await {
                Ok(Some(record)) => {
                    self.batch.push(record);
                    if self.batch.len() >= self.batch_size {
                        self.flush().await;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::error!(
                        domain = %self.domain,
                        "Shutdown drain timed out, remaining queue entries dropped"
                    );
                    break;
                }
            }
        }
    }
}
