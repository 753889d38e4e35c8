//! Audit sink that appends to the `audit_log` table.

use async_trait::async_trait;
use sqlx::PgPool;
use stratus_audit::{AuditDecoder, AuditError, AuditEvent, AuditLogEntry, AuditResult, AuditSink};
use stratus_core::CorrelationId;
use tracing::instrument;

use crate::error::{DbError, DbResult};
use crate::models::audit_log;

/// Postgres-backed audit log.
#[derive(Debug, Clone)]
pub struct PgAuditSink {
    pool: PgPool,
    decoder: AuditDecoder,
}

impl PgAuditSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            decoder: AuditDecoder::standard(),
        }
    }

    /// Use `decoder` when reading entries back.
    #[must_use]
    pub fn with_decoder(mut self, decoder: AuditDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Typed events recorded under one correlation id, oldest first.
    ///
    /// A stored row the decoder does not know fails the whole listing with
    /// [`DbError::DataIntegrity`].
    #[instrument(skip(self))]
    pub async fn list_for_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> DbResult<Vec<AuditEvent>> {
        let rows = audit_log::list_for_correlation(&self.pool, correlation_id)
            .await
            .map_err(DbError::QueryFailed)?;

        rows.iter()
            .map(|row| self.decoder.decode(row).map_err(DbError::from))
            .collect()
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn log(&self, entry: &AuditLogEntry) -> AuditResult<()> {
        audit_log::insert(&self.pool, entry)
            .await
            .map_err(|e| AuditError::Sink(e.to_string()))
    }
}
