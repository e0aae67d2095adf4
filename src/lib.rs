//! Asynchronous, batched audit-trail writer for CRUD backends.
//!
//! Records mutating business actions without adding latency or failure
//! coupling to the requests that trigger them: entries are accepted
//! through a bounded queue, batched by a single worker, and flushed to a
//! pluggable persistence sink with retry and per-item fallback. A small
//! allow-list of critical actions bypasses the queue and is written
//! synchronously.

pub mod entry;
pub mod sink;
pub mod writer;
