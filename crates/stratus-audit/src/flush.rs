//! Bounded delivery of a run's accumulated entries after commit.

use std::time::Duration;

use tokio::time::Instant;

use crate::entry::AuditLogEntry;
use crate::error::AuditError;
use crate::sink::AuditSink;

/// Outcome of a flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries accepted by the sink.
    pub delivered: usize,
    /// Entries rejected by the sink or not attempted before the deadline.
    pub failed: usize,
}

impl FlushReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Writes `entries` to `sink` one at a time, in order, within `timeout`.
///
/// Failures are logged and counted, never returned: by the time a flush
/// runs the mutations are already durable.
pub async fn flush_entries(
    sink: &dyn AuditSink,
    entries: &[AuditLogEntry],
    timeout: Duration,
) -> FlushReport {
    let deadline = Instant::now() + timeout;
    let mut report = FlushReport::default();

    for (idx, entry) in entries.iter().enumerate() {
        let result = match tokio::time::timeout_at(deadline, sink.log(entry)).await {
            Ok(result) => result,
            Err(_) => Err(AuditError::Timeout),
        };

        match result {
            Ok(()) => report.delivered += 1,
            Err(AuditError::Timeout) => {
                let remaining = entries.len() - idx;
                tracing::error!(
                    correlation_id = %entry.correlation_id,
                    remaining,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "Audit flush deadline exceeded, dropping remaining entries"
                );
                report.failed += remaining;
                break;
            }
            Err(e) => {
                tracing::error!(
                    correlation_id = %entry.correlation_id,
                    action = %entry.action,
                    target_identifier = %entry.target_identifier,
                    error = %e,
                    "Failed to write audit entry"
                );
                report.failed += 1;
            }
        }
    }

    report
}
