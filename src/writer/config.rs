//! Writer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for an [`AuditWriter`](super::AuditWriter) instance.
///
/// All durations are integer milliseconds so the struct can be embedded
/// directly in a host's configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Label for the audit domain this writer serves; tags every diagnostic.
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Capacity of the bounded intake queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Bounded wait when the queue is full before dropping the entry.
    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,
    /// Batch size that triggers an immediate flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Period of the flush timer.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Bound on the best-effort queue drain during shutdown.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// Bound on how long `stop` waits for the worker to exit.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Bulk persistence attempts before falling back to per-item writes.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff between persistence attempts; doubles per attempt.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Timeout for a single persistence call; exceeding it counts as a failure.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

fn default_domain() -> String {
    "audit".to_string()
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_enqueue_timeout_ms() -> u64 {
    100
}

fn default_batch_size() -> usize {
    20
}

fn default_flush_interval_ms() -> u64 {
    5000
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_shutdown_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            queue_capacity: default_queue_capacity(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl WriterConfig {
    /// Bounded enqueue wait as a [`Duration`].
    #[must_use]
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    /// Flush timer period as a [`Duration`].
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Shutdown drain bound as a [`Duration`].
    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Worker join bound as a [`Duration`].
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Initial retry backoff as a [`Duration`].
    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Per-attempt timeout as a [`Duration`].
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}
