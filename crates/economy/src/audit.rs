//! Audit trail for balance-changing operations.
//!
//! Every attempted balance change (including failed ones) produces one
//! [`AuditRecord`] so history can be reconstructed. Sinks are best-effort:
//! they cannot fail and must never block on I/O, since records are emitted
//! while account locks may still be held by the caller.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{LedgerError, Money};

/// Kind of balance-changing operation attributed to an audit record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Deposit,
    Withdrawal,
    Transfer,
    Set,
    Lock,
    Unlock,
}

impl OperationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
            Self::Set => "set",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

/// One attempted operation, successful or not.
#[derive(Clone, Debug, PartialEq)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    /// Identity (player or operator) that issued the operation.
    pub actor: String,
    pub kind: OperationKind,
    pub from: Option<Uuid>,
    pub to: Option<Uuid>,
    pub amount: Money,
    pub outcome: Result<(), LedgerError>,
}

/// Consumer of audit records.
///
/// Implementations must be infallible and cheap; a sink failure must never
/// fail or roll back the ledger operation that produced the record.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Audit sink that emits `tracing` events, one per record.
#[derive(Debug, Default)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, record: &AuditRecord) {
        match &record.outcome {
            Ok(()) => tracing::info!(
                actor = %record.actor,
                kind = record.kind.as_str(),
                from = ?record.from,
                to = ?record.to,
                amount = record.amount.minor_units(),
                "ledger operation applied"
            ),
            Err(err) => tracing::warn!(
                actor = %record.actor,
                kind = record.kind.as_str(),
                from = ?record.from,
                to = ?record.to,
                amount = record.amount.minor_units(),
                error = %err,
                "ledger operation rejected"
            ),
        }
    }
}

/// Bounded in-memory sink, mostly useful in tests and inspection tooling.
///
/// Oldest records are dropped once `capacity` is reached.
#[derive(Debug)]
pub struct MemoryAudit {
    capacity: usize,
    inner: Mutex<VecDeque<AuditRecord>>,
}

impl MemoryAudit {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Copies out the retained records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for MemoryAudit {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, record: &AuditRecord) {
        let mut records = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(actor: &str) -> AuditRecord {
        AuditRecord {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            kind: OperationKind::Deposit,
            from: None,
            to: Some(Uuid::new_v4()),
            amount: Money::new(100),
            outcome: Ok(()),
        }
    }

    #[test]
    fn memory_audit_keeps_insertion_order() {
        let sink = MemoryAudit::new(8);
        sink.record(&record("first"));
        sink.record(&record("second"));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].actor, "first");
        assert_eq!(records[1].actor, "second");
    }

    #[test]
    fn memory_audit_drops_oldest_at_capacity() {
        let sink = MemoryAudit::new(2);
        sink.record(&record("a"));
        sink.record(&record("b"));
        sink.record(&record("c"));

        let actors: Vec<_> = sink.records().into_iter().map(|r| r.actor).collect();
        assert_eq!(actors, vec!["b", "c"]);
    }
}
