//! Durable snapshot of the account store.
//!
//! The ledger itself never blocks an operation on persistence; the hosting
//! process decides when to checkpoint (periodic autosave, shutdown). Saves go
//! through a temp file followed by an atomic rename, so a crash mid-write
//! never corrupts the previously durable snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Account, Money, SnapshotError};

pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Persisted form of one account: `(balance, locked)` keyed by owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub balance: Money,
    pub locked: bool,
}

impl From<Account> for AccountRecord {
    fn from(account: Account) -> Self {
        Self {
            balance: account.balance,
            locked: account.locked,
        }
    }
}

/// A complete, self-consistent copy of the account store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub accounts: BTreeMap<Uuid, AccountRecord>,
}

impl Default for LedgerSnapshot {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

impl LedgerSnapshot {
    #[must_use]
    pub fn new(accounts: BTreeMap<Uuid, AccountRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            accounts,
        }
    }

    /// Reconstructs the accounts this snapshot describes.
    pub fn iter_accounts(&self) -> impl Iterator<Item = Account> + '_ {
        self.accounts.iter().map(|(owner, record)| Account {
            owner: *owner,
            balance: record.balance,
            locked: record.locked,
        })
    }

    /// Sum of all balances, saturating at the i64 bounds.
    ///
    /// Reported at restore time so operators can spot a truncated file.
    #[must_use]
    pub fn total_minor_units(&self) -> i64 {
        self.accounts
            .values()
            .fold(0i64, |acc, record| {
                acc.saturating_add(record.balance.minor_units())
            })
    }

    fn validate_version(&self) -> Result<(), SnapshotError> {
        if self.version == SNAPSHOT_VERSION {
            Ok(())
        } else {
            Err(SnapshotError::UnsupportedVersion {
                version: self.version,
                expected: SNAPSHOT_VERSION,
            })
        }
    }
}

/// Reads and writes [`LedgerSnapshot`]s at a fixed path.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot from disk.
    ///
    /// A missing file surfaces as an error for which
    /// [`SnapshotError::is_missing`] returns `true`; callers start fresh in
    /// that case and degraded-empty on any other error, never fatal.
    pub fn load(&self) -> Result<LedgerSnapshot, SnapshotError> {
        let bytes = fs::read(&self.path)?;
        let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes)?;
        snapshot.validate_version()?;
        Ok(snapshot)
    }

    /// Writes the snapshot via write-then-atomically-replace.
    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        let root =
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_snapshots");
        fs::create_dir_all(&root).unwrap();
        root.join(format!("{name}_{}.json", Uuid::new_v4()))
    }

    fn sample_snapshot() -> LedgerSnapshot {
        let mut accounts = BTreeMap::new();
        accounts.insert(
            Uuid::new_v4(),
            AccountRecord {
                balance: Money::new(1234),
                locked: false,
            },
        );
        accounts.insert(
            Uuid::new_v4(),
            AccountRecord {
                balance: Money::new(-50),
                locked: true,
            },
        );
        LedgerSnapshot::new(accounts)
    }

    #[test]
    fn round_trip_preserves_contents() {
        let store = SnapshotStore::new(scratch_path("round_trip"));
        let snapshot = sample_snapshot();

        store.save(&snapshot).unwrap();
        let restored = store.load().unwrap();

        assert_eq!(restored, snapshot);
        fs::remove_file(store.path()).unwrap();
    }

    #[test]
    fn save_replaces_previous_snapshot_atomically() {
        let store = SnapshotStore::new(scratch_path("replace"));
        store.save(&sample_snapshot()).unwrap();

        let second = sample_snapshot();
        store.save(&second).unwrap();

        assert_eq!(store.load().unwrap(), second);
        assert!(!store.path().with_extension("json.tmp").exists());
        fs::remove_file(store.path()).unwrap();
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let store = SnapshotStore::new(scratch_path("missing"));

        let err = store.load().unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let path = scratch_path("corrupt");
        fs::write(&path, b"{ not json").unwrap();
        let store = SnapshotStore::new(&path);

        let err = store.load().unwrap_err();
        assert!(matches!(err, SnapshotError::Parse(_)));
        assert!(!err.is_missing());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn future_version_is_rejected() {
        let path = scratch_path("version");
        fs::write(&path, br#"{"version": 99, "accounts": {}}"#).unwrap();
        let store = SnapshotStore::new(&path);

        let err = store.load().unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::UnsupportedVersion {
                version: 99,
                expected: SNAPSHOT_VERSION
            }
        ));
        fs::remove_file(&path).unwrap();
    }
}
