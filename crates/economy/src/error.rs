//! The module contains the errors the ledger can return.
//!
//! Ledger operations report one of three result codes:
//!
//! - [`InvalidAmount`] for non-positive (or, for a set, negative) amounts and
//!   for credits that would overflow the destination balance.
//! - [`AccountLocked`] when an involved account is administratively frozen.
//! - [`InsufficientFunds`] when the source balance is too low.
//!
//! [`InvalidAmount`]: LedgerError::InvalidAmount
//! [`AccountLocked`]: LedgerError::AccountLocked
//! [`InsufficientFunds`]: LedgerError::InsufficientFunds
use thiserror::Error;
use uuid::Uuid;

/// Result codes for ledger operations.
///
/// These are deterministic outcomes of the current account state, never
/// transient faults: callers branch on them, nothing retries internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Account {0} is locked")]
    AccountLocked(Uuid),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
}

/// Errors from loading or saving the durable snapshot.
///
/// These are reported to the host process, never propagated as failures of
/// ledger calls already completed in memory.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported snapshot version {version}, expected {expected}")]
    UnsupportedVersion { version: u32, expected: u32 },
}

impl SnapshotError {
    /// `true` when the snapshot file simply does not exist yet.
    ///
    /// A missing snapshot is a fresh start; anything else is a degraded one.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}
