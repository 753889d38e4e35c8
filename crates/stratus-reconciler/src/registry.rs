//! Reconciler registration and configuration.
//!
//! Registration and configuration each run in one session. Audit entries
//! are written after the session commits.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stratus_audit::{flush_entries, AuditEvent, AuditLogEntry, AuditSink};
use stratus_core::CorrelationId;
use stratus_db::{
    DbResult, ReconcilerConfigSpec, ReconcilerConfigValue, ReconcilerSpec, Session, StateStore,
};
use tracing::instrument;

use crate::error::{ReconcilerError, ReconcilerResult};
use crate::keyed::{reconcile_keyed, KeyedOutcome, KeyedRows};

const DEFAULT_AUDIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// A reconciler announcing itself and the configuration keys it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub reconciler: ReconcilerSpec,
    #[serde(default)]
    pub config: Vec<ReconcilerConfigSpec>,
}

impl Registration {
    fn validate(&self) -> ReconcilerResult<()> {
        let invalid = |message: String| ReconcilerError::InvalidRegistration {
            reconciler: self.reconciler.name.clone(),
            message,
        };

        if self.reconciler.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.config.len());
        for spec in &self.config {
            if spec.key.is_empty() {
                return Err(invalid("configuration keys must not be empty".to_string()));
            }
            if !seen.insert(spec.key.as_str()) {
                return Err(invalid(format!(
                    "configuration key {:?} declared more than once",
                    spec.key
                )));
            }
        }
        Ok(())
    }
}

/// Configuration rows of one reconciler, seen through a session.
pub struct ConfigRows<'s> {
    session: &'s mut dyn Session,
    reconciler: &'s str,
}

impl<'s> ConfigRows<'s> {
    pub fn new(session: &'s mut dyn Session, reconciler: &'s str) -> Self {
        Self {
            session,
            reconciler,
        }
    }
}

#[async_trait]
impl KeyedRows<ReconcilerConfigSpec> for ConfigRows<'_> {
    async fn existing_keys(&mut self) -> DbResult<Vec<String>> {
        self.session
            .list_reconciler_config_keys(self.reconciler)
            .await
    }

    async fn upsert(&mut self, row: &ReconcilerConfigSpec) -> DbResult<()> {
        self.session
            .upsert_reconciler_config(self.reconciler, row)
            .await
    }

    async fn delete(&mut self, keys: &[String]) -> DbResult<()> {
        self.session
            .delete_reconciler_config(self.reconciler, keys)
            .await
    }
}

/// Registers reconcilers and stores their configuration.
pub struct ReconcilerRegistry {
    store: Arc<dyn StateStore>,
    audit: Arc<dyn AuditSink>,
    audit_flush_timeout: Duration,
}

impl ReconcilerRegistry {
    pub fn new(store: Arc<dyn StateStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            audit_flush_timeout: DEFAULT_AUDIT_FLUSH_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_audit_flush_timeout(mut self, timeout: Duration) -> Self {
        self.audit_flush_timeout = timeout;
        self
    }

    /// Upsert each reconciler and sync its declared configuration keys.
    ///
    /// All registrations are validated before anything is written and are
    /// applied in a single session. Keys a reconciler no longer declares
    /// are deleted together with their values.
    #[instrument(skip(self, registrations), fields(count = registrations.len()))]
    pub async fn register(
        &self,
        correlation_id: CorrelationId,
        registrations: &[Registration],
    ) -> ReconcilerResult<Vec<KeyedOutcome>> {
        for registration in registrations {
            registration.validate()?;
        }

        let mut session = self.store.begin().await?;
        let mut outcomes = Vec::with_capacity(registrations.len());
        let mut events = Vec::with_capacity(registrations.len());

        for registration in registrations {
            let name = registration.reconciler.name.as_str();
            session.upsert_reconciler(&registration.reconciler).await?;

            let mut rows = ConfigRows::new(session.as_mut(), name);
            let outcome = reconcile_keyed(&mut rows, &registration.config).await?;
            tracing::debug!(
                reconciler = name,
                upserted = outcome.upserted,
                deleted = outcome.deleted.len(),
                "Synced reconciler config keys"
            );

            outcomes.push(outcome);
            events.push(AuditEvent::ReconcilerRegistered {
                reconciler: name.to_string(),
            });
        }

        session.commit().await?;
        tracing::info!(count = registrations.len(), "Registered reconcilers");

        self.flush(correlation_id, &events).await;
        Ok(outcomes)
    }

    /// Store values for declared configuration keys of `reconciler`.
    ///
    /// Any key the reconciler has not declared rejects the whole call. When
    /// a key is given more than once the last value wins. Returns the
    /// updated keys, sorted.
    #[instrument(skip(self, values), fields(count = values.len()))]
    pub async fn configure(
        &self,
        correlation_id: CorrelationId,
        reconciler: &str,
        values: &[ReconcilerConfigValue],
    ) -> ReconcilerResult<Vec<String>> {
        let updates: BTreeMap<&str, &ReconcilerConfigValue> =
            values.iter().map(|v| (v.key.as_str(), v)).collect();

        let mut session = self.store.begin().await?;
        let mut valid = session.list_reconciler_config_keys(reconciler).await?;
        valid.sort();

        if let Some(key) = updates
            .keys()
            .find(|key| !valid.iter().any(|v| v.as_str() == **key))
        {
            return Err(ReconcilerError::UnknownConfigKey {
                reconciler: reconciler.to_string(),
                key: (*key).to_string(),
                valid,
            });
        }

        for value in updates.values() {
            session
                .set_reconciler_config_value(reconciler, value)
                .await?;
        }
        session.commit().await?;

        let keys: Vec<String> = updates.keys().map(|k| (*k).to_string()).collect();
        tracing::info!(reconciler, keys = ?keys, "Configured reconciler");

        self.flush(
            correlation_id,
            &[AuditEvent::ReconcilerConfigured {
                reconciler: reconciler.to_string(),
                keys: keys.clone(),
            }],
        )
        .await;
        Ok(keys)
    }

    async fn flush(&self, correlation_id: CorrelationId, events: &[AuditEvent]) {
        let entries: Vec<AuditLogEntry> = events
            .iter()
            .map(|event| AuditLogEntry::from_event(correlation_id, event))
            .collect();
        let report = flush_entries(self.audit.as_ref(), &entries, self.audit_flush_timeout).await;
        if !report.is_complete() {
            tracing::error!(
                %correlation_id,
                failed = report.failed,
                "Audit entries for reconciler change were not all written"
            );
        }
    }
}
