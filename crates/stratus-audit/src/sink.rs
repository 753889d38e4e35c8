//! Audit sinks.
//!
//! A sink accepts finished [`AuditLogEntry`] values after the mutation they
//! describe has been committed. Sinks are append-only.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::entry::AuditLogEntry;
use crate::error::AuditResult;

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry.
    async fn log(&self, entry: &AuditLogEntry) -> AuditResult<()>;
}

/// Emits every entry as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn log(&self, entry: &AuditLogEntry) -> AuditResult<()> {
        tracing::info!(
            correlation_id = %entry.correlation_id,
            action = %entry.action,
            target_type = %entry.target_type,
            target_identifier = %entry.target_identifier,
            data = ?entry.data,
            "{}",
            entry.message
        );
        Ok(())
    }
}

/// Forwards each entry to several sinks.
///
/// Every sink is attempted even when an earlier one fails; the first error
/// is returned.
#[derive(Clone, Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    /// Adds a sink to the fan-out.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl AuditSink for FanoutAuditSink {
    async fn log(&self, entry: &AuditLogEntry) -> AuditResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.log(entry).await {
                tracing::warn!(
                    correlation_id = %entry.correlation_id,
                    error = %e,
                    "Audit sink rejected entry"
                );
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// In-memory sink for testing.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
}

impl InMemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in the order they were logged.
    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn log(&self, entry: &AuditLogEntry) -> AuditResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }
}
