//! Buffered audit writer: intake surface, batching worker, and lifecycle.

mod batch;
mod config;
mod service;
mod worker;

pub use batch::BatchWriter;
pub use config::WriterConfig;
pub use service::AuditWriter;
