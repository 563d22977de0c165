//! Economy core for a game server: per-player monetary accounts plus the
//! transaction engine that moves money between them.
//!
//! The hosting command layer resolves player identities and permissions, then
//! calls [`Ledger`] operations with already-validated arguments; the ledger
//! enforces the real invariants (conservation across transfers, no concurrent
//! double-spend, locked-account enforcement) and reports result codes the
//! caller renders. Persistence is decoupled: the host checkpoints a
//! [`LedgerSnapshot`] through a [`SnapshotStore`] at its own pace.

use chrono::Utc;
use uuid::Uuid;

pub use accounts::{Account, AccountStore};
pub use audit::{AuditRecord, AuditSink, MemoryAudit, OperationKind, TracingAudit};
pub use error::{LedgerError, SnapshotError};
pub use money::Money;
pub use snapshot::{AccountRecord, LedgerSnapshot, SnapshotStore, SNAPSHOT_VERSION};

use accounts::lock_account;

mod accounts;
mod audit;
mod error;
mod money;
mod snapshot;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// The transaction engine over the account store.
///
/// All operations take `&self` and are safe under true parallel invocation:
/// per-account mutexes serialize touching the same account, and two-account
/// transfers acquire both locks in `Uuid` order so opposite-direction
/// transfers over the same pair cannot deadlock. No operation waits on I/O
/// while holding an account lock.
pub struct Ledger {
    store: AccountStore,
    audit: Box<dyn AuditSink>,
}

impl Ledger {
    /// Return a builder for `Ledger`.
    #[must_use]
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    /// Moves `amount` between accounts, or in and out of the economy itself.
    ///
    /// Exactly one of `from`/`to` may be `None`: a pure deposit when `from`
    /// is absent, a pure withdrawal when `to` is absent. Both present is a
    /// transfer; both absent is an invalid request.
    ///
    /// The debit and credit become visible together or not at all. Failures
    /// leave every balance unchanged and are still audited.
    pub fn exchange(
        &self,
        from: Option<Uuid>,
        to: Option<Uuid>,
        amount: Money,
        actor: &str,
    ) -> LedgerResult<()> {
        let (kind, outcome) = match (from, to) {
            (None, None) => (
                OperationKind::Transfer,
                Err(LedgerError::InvalidAmount(
                    "exchange needs a source or a destination".to_string(),
                )),
            ),
            (None, Some(owner)) => (OperationKind::Deposit, self.deposit_into(owner, amount)),
            (Some(owner), None) => (OperationKind::Withdrawal, self.withdraw_from(owner, amount)),
            (Some(src), Some(dst)) => (
                OperationKind::Transfer,
                self.transfer_between(src, dst, amount),
            ),
        };

        self.emit(kind, actor, from, to, amount, &outcome);
        outcome
    }

    /// Sets the balance of `owner` to exactly `amount`.
    ///
    /// Administrative override: it applies regardless of the previous value
    /// and is deliberately not gated by the `locked` flag. Negative amounts
    /// are rejected.
    pub fn set_money(&self, owner: Uuid, amount: Money, actor: &str) -> LedgerResult<()> {
        let outcome = if amount.is_negative() {
            Err(LedgerError::InvalidAmount(format!(
                "cannot set a negative balance ({amount})"
            )))
        } else {
            let slot = self.store.entry(owner);
            lock_account(&slot).balance = amount;
            Ok(())
        };

        self.emit(OperationKind::Set, actor, None, Some(owner), amount, &outcome);
        outcome
    }

    /// Returns a copy of the account for `owner`.
    ///
    /// Uses get-or-create semantics: a never-before-seen player reads as
    /// `{balance: 0, locked: false}`.
    #[must_use]
    pub fn account(&self, owner: Uuid) -> Account {
        self.store.get_or_create(owner)
    }

    /// Reads an account without creating it.
    #[must_use]
    pub fn peek(&self, owner: Uuid) -> Option<Account> {
        self.store.peek(owner)
    }

    /// Freezes an account against balance changes. Reads still work, and the
    /// flag itself is not guarded by `locked` (an operator can always flip
    /// it).
    pub fn lock(&self, owner: Uuid, actor: &str) {
        self.set_locked(owner, true, actor);
    }

    /// Unfreezes an account.
    pub fn unlock(&self, owner: Uuid, actor: &str) {
        self.set_locked(owner, false, actor);
    }

    /// Number of accounts ever referenced.
    #[must_use]
    pub fn account_count(&self) -> usize {
        self.store.len()
    }

    /// Point-in-time snapshot of every account for persistence.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::new(
            self.store
                .snapshot()
                .into_iter()
                .map(|(owner, account)| (owner, account.into()))
                .collect(),
        )
    }

    fn set_locked(&self, owner: Uuid, locked: bool, actor: &str) {
        let slot = self.store.entry(owner);
        lock_account(&slot).locked = locked;

        let kind = if locked {
            OperationKind::Lock
        } else {
            OperationKind::Unlock
        };
        self.emit(kind, actor, None, Some(owner), Money::ZERO, &Ok(()));
    }

    fn deposit_into(&self, owner: Uuid, amount: Money) -> LedgerResult<()> {
        check_amount(amount)?;

        let slot = self.store.entry(owner);
        let mut account = lock_account(&slot);
        if account.locked {
            return Err(LedgerError::AccountLocked(owner));
        }
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| overflow(owner))?;
        Ok(())
    }

    fn withdraw_from(&self, owner: Uuid, amount: Money) -> LedgerResult<()> {
        check_amount(amount)?;

        let slot = self.store.entry(owner);
        let mut account = lock_account(&slot);
        if account.locked {
            return Err(LedgerError::AccountLocked(owner));
        }
        if account.balance < amount {
            return Err(insufficient(owner, account.balance, amount));
        }
        account.balance = account
            .balance
            .checked_sub(amount)
            .ok_or_else(|| overflow(owner))?;
        Ok(())
    }

    fn transfer_between(&self, src: Uuid, dst: Uuid, amount: Money) -> LedgerResult<()> {
        check_amount(amount)?;

        if src == dst {
            // Net-zero by definition, but locked and funds checks still
            // apply; locking the same slot twice would deadlock.
            let slot = self.store.entry(src);
            let account = lock_account(&slot);
            if account.locked {
                return Err(LedgerError::AccountLocked(src));
            }
            if account.balance < amount {
                return Err(insufficient(src, account.balance, amount));
            }
            return Ok(());
        }

        let src_slot = self.store.entry(src);
        let dst_slot = self.store.entry(dst);

        // Fixed total order on owner ids prevents deadlock between two
        // transfers over the same pair in opposite directions.
        let (mut src_account, mut dst_account);
        if src < dst {
            src_account = lock_account(&src_slot);
            dst_account = lock_account(&dst_slot);
        } else {
            dst_account = lock_account(&dst_slot);
            src_account = lock_account(&src_slot);
        }

        if src_account.locked {
            return Err(LedgerError::AccountLocked(src));
        }
        if dst_account.locked {
            return Err(LedgerError::AccountLocked(dst));
        }
        if src_account.balance < amount {
            return Err(insufficient(src, src_account.balance, amount));
        }
        let credited = dst_account
            .balance
            .checked_add(amount)
            .ok_or_else(|| overflow(dst))?;
        let debited = src_account
            .balance
            .checked_sub(amount)
            .ok_or_else(|| overflow(src))?;

        // Both locks are held: the two mutations become visible together.
        src_account.balance = debited;
        dst_account.balance = credited;
        Ok(())
    }

    fn emit(
        &self,
        kind: OperationKind,
        actor: &str,
        from: Option<Uuid>,
        to: Option<Uuid>,
        amount: Money,
        outcome: &LedgerResult<()>,
    ) {
        self.audit.record(&AuditRecord {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            kind,
            from,
            to,
            amount,
            outcome: outcome.clone(),
        });
    }
}

fn check_amount(amount: Money) -> LedgerResult<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )))
    }
}

fn overflow(owner: Uuid) -> LedgerError {
    LedgerError::InvalidAmount(format!("amount overflows the balance of {owner}"))
}

fn insufficient(owner: Uuid, balance: Money, amount: Money) -> LedgerError {
    LedgerError::InsufficientFunds(format!("{owner} holds {balance}, needs {amount}"))
}

/// The builder for `Ledger`.
#[derive(Default)]
pub struct LedgerBuilder {
    snapshot: Option<LedgerSnapshot>,
    audit: Option<Box<dyn AuditSink>>,
}

impl LedgerBuilder {
    /// Restore accounts from a previously saved snapshot.
    #[must_use]
    pub fn snapshot(mut self, snapshot: LedgerSnapshot) -> LedgerBuilder {
        self.snapshot = Some(snapshot);
        self
    }

    /// Attach the audit sink. Defaults to [`TracingAudit`].
    #[must_use]
    pub fn audit(mut self, sink: Box<dyn AuditSink>) -> LedgerBuilder {
        self.audit = Some(sink);
        self
    }

    /// Construct `Ledger`.
    #[must_use]
    pub fn build(self) -> Ledger {
        let store = AccountStore::new();
        if let Some(snapshot) = self.snapshot {
            for account in snapshot.iter_accounts() {
                store.insert(account);
            }
        }

        Ledger {
            store,
            audit: self.audit.unwrap_or_else(|| Box::new(TracingAudit)),
        }
    }
}
