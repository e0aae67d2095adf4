//! Integration tests for the buffered audit writer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use audit_relay::entry::{AuditAction, AuditEntry, AuditRecord};
use audit_relay::sink::{AuditSink, MemorySink, SinkError};
use audit_relay::writer::{AuditWriter, WriterConfig};

/// Sink whose bulk writes take a fixed amount of time.
#[derive(Clone)]
struct SlowSink {
    inner: MemorySink,
    delay: Duration,
}

#[async_trait]
impl AuditSink for SlowSink {
    async fn create(&self, record: &AuditRecord) -> Result<i64, SinkError> {
        tokio::time::sleep(self.delay).await;
        self.inner.create(record).await
    }

    async fn create_batch(&self, records: &[AuditRecord]) -> Result<(), SinkError> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_batch(records).await
    }
}

/// Sink that rejects every write and counts the attempts.
#[derive(Default)]
struct FailingSink {
    bulk_calls: AtomicUsize,
    item_calls: AtomicUsize,
}

#[async_trait]
impl AuditSink for FailingSink {
    async fn create(&self, _record: &AuditRecord) -> Result<i64, SinkError> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Unavailable("always fails".to_string()))
    }

    async fn create_batch(&self, _records: &[AuditRecord]) -> Result<(), SinkError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Unavailable("always fails".to_string()))
    }
}

/// Route writer diagnostics to the test output when `RUST_LOG` is set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn quiet_config() -> WriterConfig {
    // Large thresholds and a long timer so nothing flushes unless a test
    // drives it explicitly.
    WriterConfig {
        domain: "test".to_string(),
        queue_capacity: 100,
        batch_size: 50,
        flush_interval_ms: 60_000,
        drain_timeout_ms: 2000,
        shutdown_timeout_ms: 5000,
        retry_backoff_ms: 1,
        ..WriterConfig::default()
    }
}

fn create_entry(record_id: &str) -> AuditEntry {
    AuditEntry::builder(AuditAction::Create, "businesses")
        .record_id(record_id)
        .new_data(&serde_json::json!({"id": record_id}))
        .build()
}

#[tokio::test]
async fn test_read_only_actions_never_persisted() {
    let sink = MemorySink::new();
    let writer = AuditWriter::new(sink.clone(), quiet_config());
    writer.start().await;

    writer
        .log(AuditEntry::builder(AuditAction::List, "businesses").build())
        .await;
    writer
        .log(
            AuditEntry::builder(AuditAction::View, "businesses")
                .record_id("b-1")
                .new_data(&serde_json::json!({"id": "b-1"}))
                .build(),
        )
        .await;
    // A mutation without any snapshot is not eligible either.
    writer
        .log(AuditEntry::builder(AuditAction::Update, "businesses").build())
        .await;

    writer.stop().await;
    assert!(sink.is_empty().await);
}

#[tokio::test]
async fn test_async_intake_isolated_from_caller_mutation() {
    let sink = MemorySink::new();
    let writer = AuditWriter::new(sink.clone(), quiet_config());
    writer.start().await;

    let mut entry = AuditEntry::builder(AuditAction::Update, "businesses")
        .record_id("b-1")
        .old_data(&serde_json::json!({"name": "original"}))
        .new_data(&serde_json::json!({"name": "renamed"}))
        .context_str("method", "PUT")
        .build();

    writer.log_async(&entry);

    // The caller is free to reuse its entry immediately.
    entry.new_data = Some(serde_json::json!({"name": "corrupted"}));
    entry
        .context
        .insert("method".to_string(), serde_json::json!("DELETE"));
    entry.record_id = "other".to_string();

    tokio::time::sleep(Duration::from_millis(100)).await;
    writer.stop().await;

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_id, "b-1");
    assert_eq!(records[0].new_data.as_deref(), Some(r#"{"name":"renamed"}"#));
    assert_eq!(records[0].context.as_deref(), Some(r#"{"method":"PUT"}"#));
}

#[tokio::test]
async fn test_queue_full_drops_excess() {
    init_tracing();
    let sink = SlowSink {
        inner: MemorySink::new(),
        delay: Duration::from_millis(150),
    };
    let inner = sink.inner.clone();
    let config = WriterConfig {
        queue_capacity: 2,
        batch_size: 1,
        enqueue_timeout_ms: 5,
        ..quiet_config()
    };
    let writer = AuditWriter::new(sink, config);
    writer.start().await;

    let submitted = 12;
    for i in 0..submitted {
        // Bounded wait only; the caller is never blocked indefinitely.
        writer.log(create_entry(&format!("b-{i}"))).await;
    }

    writer.stop().await;

    let persisted = inner.len().await;
    assert!(persisted >= 1, "accepted entries must be persisted");
    assert!(
        persisted < submitted,
        "submitting faster than the worker drains must drop at least one entry"
    );
}

#[tokio::test]
async fn test_threshold_flush_is_immediate() {
    let sink = MemorySink::new();
    let config = WriterConfig {
        batch_size: 10,
        ..quiet_config()
    };
    let writer = AuditWriter::new(sink.clone(), config);
    writer.start().await;

    for i in 0..12 {
        writer.log(create_entry(&format!("b-{i}"))).await;
    }

    // The timer is a minute out; only the size trigger can have fired.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sink.len().await, 10);

    // The remaining two flush on shutdown.
    writer.stop().await;
    assert_eq!(sink.len().await, 12);
}

#[tokio::test]
async fn test_timer_flushes_partial_batch() {
    let sink = MemorySink::new();
    let config = WriterConfig {
        flush_interval_ms: 100,
        ..quiet_config()
    };
    let writer = AuditWriter::new(sink.clone(), config);
    writer.start().await;

    for i in 0..3 {
        writer.log(create_entry(&format!("b-{i}"))).await;
    }

    // Under threshold, no new entries: the next tick flushes.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(sink.len().await, 3);

    writer.stop().await;
}

#[tokio::test]
async fn test_stop_persists_accepted_entries() {
    let sink = MemorySink::new();
    let writer = AuditWriter::new(sink.clone(), quiet_config());
    writer.start().await;

    for i in 0..7 {
        writer.log(create_entry(&format!("b-{i}"))).await;
    }

    writer.stop().await;
    assert_eq!(sink.len().await, 7);
}

#[tokio::test]
async fn test_critical_action_persisted_before_intake_returns() {
    let sink = MemorySink::new();
    let writer = AuditWriter::new(sink.clone(), quiet_config());
    writer.start().await;

    writer
        .log(
            AuditEntry::builder(AuditAction::Delete, "users")
                .record_id("u-9")
                .old_data(&serde_json::json!({"email": "a@b.c"}))
                .build(),
        )
        .await;

    // No flush has run and the timer is far away: the write was synchronous.
    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Delete);
    assert_eq!(records[0].record_id, "u-9");

    // A normal entry still waits in the queue until a flush trigger.
    writer.log(create_entry("b-1")).await;
    assert_eq!(sink.len().await, 1);

    writer.stop().await;
    assert_eq!(sink.len().await, 2);
}

#[tokio::test]
async fn test_retry_exhaustion_drops_batch_once() {
    init_tracing();
    let sink = Arc::new(FailingSink::default());
    let config = WriterConfig {
        batch_size: 2,
        ..quiet_config()
    };
    let writer = AuditWriter::new(Arc::clone(&sink), config);
    writer.start().await;

    writer.log(create_entry("b-0")).await;
    writer.log(create_entry("b-1")).await;

    tokio::time::sleep(Duration::from_millis(300)).await;

    // Three bulk attempts, then one per-item salvage pass, then nothing.
    assert_eq!(sink.bulk_calls.load(Ordering::SeqCst), 3);
    assert_eq!(sink.item_calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sink.bulk_calls.load(Ordering::SeqCst), 3);

    writer.stop().await;
}

#[tokio::test]
async fn test_intake_after_stop_is_noop() {
    let sink = MemorySink::new();
    let writer = AuditWriter::new(sink.clone(), quiet_config());
    writer.start().await;
    writer.stop().await;

    writer.log(create_entry("late")).await;
    let entry = create_entry("late-async");
    writer.log_async(&entry);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(sink.is_empty().await);
}

#[tokio::test]
async fn test_one_writer_per_domain_sink() {
    let business_sink = MemorySink::new();
    let catalog_sink = MemorySink::new();

    let business = AuditWriter::new(
        business_sink.clone(),
        WriterConfig {
            domain: "business".to_string(),
            ..quiet_config()
        },
    );
    let catalog = AuditWriter::new(
        catalog_sink.clone(),
        WriterConfig {
            domain: "catalog".to_string(),
            ..quiet_config()
        },
    );
    business.start().await;
    catalog.start().await;

    business.log(create_entry("biz-1")).await;
    catalog
        .log(
            AuditEntry::builder(AuditAction::Update, "catalog_items")
                .record_id("item-1")
                .old_data(&serde_json::json!({"price": 10}))
                .new_data(&serde_json::json!({"price": 12}))
                .build(),
        )
        .await;

    business.stop().await;
    catalog.stop().await;

    // Each entry is routed to exactly one sink.
    let business_records = business_sink.records().await;
    let catalog_records = catalog_sink.records().await;
    assert_eq!(business_records.len(), 1);
    assert_eq!(catalog_records.len(), 1);
    assert_eq!(business_records[0].record_id, "biz-1");
    assert_eq!(catalog_records[0].target_table, "catalog_items");
}
