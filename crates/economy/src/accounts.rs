//! Keyed storage for player accounts, safe under concurrent access.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Money;

/// A player's monetary account.
///
/// Accounts are created lazily with a zero balance on first reference and are
/// never deleted by the ledger. `locked` blocks balance changes while still
/// permitting reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable player identity; unique key in the store.
    pub owner: Uuid,
    pub balance: Money,
    pub locked: bool,
}

impl Account {
    pub(crate) fn empty(owner: Uuid) -> Self {
        Self {
            owner,
            balance: Money::ZERO,
            locked: false,
        }
    }
}

/// Shared store of account records.
///
/// Membership is guarded by a map-level `RwLock`; each record sits behind its
/// own mutex so independent accounts never contend with each other. Records
/// are copied out on read, so no caller ever observes a torn account.
#[derive(Debug, Default)]
pub struct AccountStore {
    inner: RwLock<HashMap<Uuid, Arc<Mutex<Account>>>>,
}

/// Locks an account record, recovering from a poisoned mutex.
///
/// Every mutation validates before assigning, so a record is consistent even
/// if a holder panicked mid-operation.
pub(crate) fn lock_account(slot: &Mutex<Account>) -> MutexGuard<'_, Account> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared slot for `owner`, creating a zero-balance unlocked
    /// account on first reference.
    pub(crate) fn entry(&self, owner: Uuid) -> Arc<Mutex<Account>> {
        if let Some(slot) = self.read_map().get(&owner) {
            return Arc::clone(slot);
        }

        let mut map = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            map.entry(owner)
                .or_insert_with(|| Arc::new(Mutex::new(Account::empty(owner)))),
        )
    }

    /// Returns a copy of the account for `owner`, creating it if unseen.
    ///
    /// Never fails: a never-before-seen player has a defined zero balance.
    #[must_use]
    pub fn get_or_create(&self, owner: Uuid) -> Account {
        *lock_account(&self.entry(owner))
    }

    /// Reads an account without creating it.
    ///
    /// Use this for reporting that must not fabricate accounts.
    #[must_use]
    pub fn peek(&self, owner: Uuid) -> Option<Account> {
        self.read_map().get(&owner).map(|slot| *lock_account(slot))
    }

    /// Replaces (or inserts) a whole record. Used when restoring a snapshot.
    pub(crate) fn insert(&self, account: Account) {
        let slot = self.entry(account.owner);
        *lock_account(&slot) = account;
    }

    /// Point-in-time copy of every account, keyed in stable order.
    ///
    /// Each record is locked only long enough to copy it, so the result is
    /// internally consistent per record while ongoing operations proceed.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<Uuid, Account> {
        self.read_map()
            .iter()
            .map(|(owner, slot)| (*owner, *lock_account(slot)))
            .collect()
    }

    /// Number of accounts ever referenced.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, Arc<Mutex<Account>>>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_starts_at_zero_unlocked() {
        let store = AccountStore::new();
        let owner = Uuid::new_v4();

        let account = store.get_or_create(owner);

        assert_eq!(account.owner, owner);
        assert_eq!(account.balance, Money::ZERO);
        assert!(!account.locked);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn peek_does_not_fabricate_accounts() {
        let store = AccountStore::new();

        assert!(store.peek(Uuid::new_v4()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = AccountStore::new();
        let owner = Uuid::new_v4();

        store.insert(Account {
            owner,
            balance: Money::new(500),
            locked: true,
        });
        let account = store.get_or_create(owner);

        assert_eq!(account.balance, Money::new(500));
        assert!(account.locked);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshot_copies_every_record() {
        let store = AccountStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.insert(Account {
            owner: a,
            balance: Money::new(100),
            locked: false,
        });
        store.insert(Account {
            owner: b,
            balance: Money::new(-40),
            locked: true,
        });

        let snapshot = store.snapshot();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&a].balance, Money::new(100));
        assert!(snapshot[&b].locked);
    }
}
