//! Audit trail for stratus reconciliation.
//!
//! Reconciliation runs accumulate [`AuditLogEntry`] values in memory while
//! they mutate state, then hand them to an [`AuditSink`] with
//! [`flush_entries`] once the transaction has committed.
//!
//! Stored rows are read back into the closed [`AuditEvent`] type through an
//! [`AuditDecoder`] table.

pub mod entry;
pub mod error;
pub mod event;
pub mod flush;
pub mod sink;

pub use entry::{AuditAction, AuditLogEntry, AuditTargetType, StoredAuditEntry};
pub use error::{AuditError, AuditResult};
pub use event::{AuditDecoder, AuditEvent, DecodeFn, DecoderEntry};
pub use flush::{flush_entries, FlushReport};
pub use sink::{AuditSink, FanoutAuditSink, InMemoryAuditSink, TracingAuditSink};
