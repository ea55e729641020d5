use chrono::{DateTime, Utc};

use corebank_core::{AccountId, Money};

/// The single place balance arithmetic occurs.
///
/// Both the live write path and replay-from-history go through this
/// function, so the cached projection and the transaction log can never
/// disagree about what a movement does to a balance.
pub fn apply_transaction(balance: Money, amount: Money, is_credit: bool) -> Money {
    if is_credit { balance + amount } else { balance - amount }
}

/// Cached running balance for one account.
///
/// One row per account, created lazily on the first transaction. The
/// `version` field is the optimistic concurrency token: it reflects the
/// persisted row this projection was loaded from (0 for a row that does not
/// exist yet) and is advanced by the store on every successful write. A
/// projection is a cache of the transaction history's sum, never an
/// independent source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceProjection {
    account_id: AccountId,
    current_balance: Money,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl BalanceProjection {
    /// Fresh projection for an account with no persisted balance row.
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            current_balance: Money::ZERO,
            updated_at: Utc::now(),
            version: 0,
        }
    }

    /// Rehydrate a projection from its persisted row.
    pub fn from_stored(
        account_id: AccountId,
        current_balance: Money,
        updated_at: DateTime<Utc>,
        version: u64,
    ) -> Self {
        Self {
            account_id,
            current_balance,
            updated_at,
            version,
        }
    }

    /// Apply one movement in memory and return the resulting balance.
    ///
    /// Leaves `version` untouched: the token still identifies the row this
    /// projection was read from, which is what the store's compare-and-swap
    /// checks at commit time.
    pub fn apply_transaction(&mut self, amount: Money, is_credit: bool) -> Money {
        self.current_balance = apply_transaction(self.current_balance, amount, is_credit);
        self.updated_at = Utc::now();
        self.current_balance
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn current_balance(&self) -> Money {
        self.current_balance
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Concurrency token of the row this projection was loaded from.
    pub fn version(&self) -> u64 {
        self.version
    }
}
