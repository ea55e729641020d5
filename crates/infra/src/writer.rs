//! Ledger write coordination (application-level orchestration).
//!
//! [`LedgerWriter`] is the one path money movements take into the store:
//!
//! ```text
//! CreateTransaction (already validated)
//!   ↓
//! 1. Resolve idempotency (replay returns the original record)
//!   ↓
//! 2. Load or lazily initialize the balance projection
//!   ↓
//! 3. Apply the movement in memory (single mutation rule)
//!   ↓
//! 4. Commit transaction + idempotency marker + balance atomically
//!   ↓
//! 5. Hand the TransactionRecorded event to the notifier (post-commit)
//! ```
//!
//! The writer never retries a concurrency conflict itself: a conflicting
//! caller must restart from step 2 with a fresh read, and keeping that loop
//! outside the writer keeps the retry policy visible and boundable. It also
//! never re-creates a missing transaction behind an existing idempotency
//! marker: that state is a data-integrity alarm, not something to heal
//! silently.

use thiserror::Error;

use corebank_core::{AccountId, TransactionId};
use corebank_events::Notifier;
use corebank_ledger::{
    BalanceProjection, CreateTransaction, IdempotencyKey, IdempotencyRecord, LedgerEvent,
    TransactionKind, TransactionRecord, TransactionRecorded,
};

use crate::ledger_store::{LedgerStore, PageRequest, StoreError, TimeRange, TransactionPage};

/// Write pipeline error.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Input failed validation; no persistence was touched. Safe to retry
    /// after correcting the input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An idempotency marker exists but the transaction it references does
    /// not. Surfaced to the operator, never auto-healed.
    #[error("inconsistent idempotent state: {0}")]
    InconsistentIdempotentState(String),

    /// Another write landed on the same account between read and commit.
    /// The caller may retry the whole operation from a fresh read.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// The store failed; the atomic unit was rolled back.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WriteError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => WriteError::Concurrency(msg),
            other => WriteError::Store(other),
        }
    }
}

/// Whether a debit may take an account balance below zero.
///
/// The ledger itself allows overdraft; rejecting it is a product decision,
/// so it is an explicit configuration point rather than a silent default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverdraftPolicy {
    #[default]
    Allow,
    Reject,
}

/// The ledger write coordinator.
///
/// Composes a [`LedgerStore`] (atomic persistence) and a [`Notifier`]
/// (post-commit event delivery). Notifier failures are logged and never
/// downgrade a committed write to a failure; idempotent replays produce no
/// notification at all.
#[derive(Debug)]
pub struct LedgerWriter<S, N> {
    store: S,
    notifier: N,
    overdraft: OverdraftPolicy,
}

impl<S, N> LedgerWriter<S, N>
where
    S: LedgerStore,
    N: Notifier<LedgerEvent>,
{
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            store,
            notifier,
            overdraft: OverdraftPolicy::default(),
        }
    }

    pub fn with_overdraft_policy(mut self, policy: OverdraftPolicy) -> Self {
        self.overdraft = policy;
        self
    }

    /// Record one money movement, exactly once per request identity.
    ///
    /// Validation already happened when the [`CreateTransaction`] command was
    /// constructed, so every failure past this point is either a replay
    /// resolution, a concurrency conflict or a store failure, and none of
    /// them leaves partial state behind.
    pub async fn create_transaction(
        &self,
        cmd: &CreateTransaction,
    ) -> Result<TransactionRecord, WriteError> {
        let key = IdempotencyKey::create_transaction(cmd.request_id());

        if let Some(marker) = self.store.find_idempotency_record(&key).await? {
            return self.resolve_replay(&marker).await;
        }

        let mut balance = match self.store.find_balance(cmd.account_id()).await? {
            Some(balance) => balance,
            None => BalanceProjection::new(cmd.account_id()),
        };

        let new_balance = balance.apply_transaction(cmd.amount(), cmd.kind().is_credit());
        if self.overdraft == OverdraftPolicy::Reject
            && cmd.kind() == TransactionKind::Debit
            && new_balance.is_negative()
        {
            return Err(WriteError::Validation(format!(
                "insufficient funds: debit of {} would overdraw account {}",
                cmd.amount(),
                cmd.account_id()
            )));
        }

        let record = TransactionRecord::new(
            cmd.account_id(),
            cmd.kind(),
            cmd.operation(),
            cmd.amount(),
            new_balance,
            cmd.description().map(str::to_string),
            cmd.correlation_id(),
        )
        .map_err(|e| WriteError::Validation(e.to_string()))?;
        let marker = IdempotencyRecord::new(key.clone(), record.id());

        match self
            .store
            .commit_ledger_write(&record, &marker, &balance)
            .await
        {
            Ok(()) => {}
            Err(StoreError::DuplicateKey) => {
                // Lost the race on the key: some other request with the same
                // identity committed first. The unique constraint is the
                // final authority, so resolve it exactly like the found-
                // existing path above.
                tracing::info!(
                    request_id = %cmd.request_id(),
                    "idempotency key committed concurrently; resolving as replay"
                );
                return match self.store.find_idempotency_record(&key).await? {
                    Some(marker) => self.resolve_replay(&marker).await,
                    None => Err(WriteError::InconsistentIdempotentState(format!(
                        "idempotency key for request {} reported duplicate but cannot be loaded",
                        cmd.request_id()
                    ))),
                };
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            request_id = %cmd.request_id(),
            account_id = %record.account_id(),
            transaction_id = %record.id(),
            kind = record.kind().as_str(),
            amount = %record.amount(),
            balance_after = %record.balance_after(),
            "transaction committed"
        );

        let event = LedgerEvent::TransactionRecorded(TransactionRecorded {
            transaction_id: record.id(),
            account_id: record.account_id(),
            amount: record.amount(),
            kind: record.kind(),
            occurred_at: record.created_at(),
        });
        if let Err(e) = self.notifier.notify(std::slice::from_ref(&event)) {
            // The write is already durable; delivery is best-effort.
            tracing::warn!(
                transaction_id = %record.id(),
                error = %e,
                "post-commit notification failed"
            );
        }

        Ok(record)
    }

    /// Load one transaction by id (read-only).
    pub async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, WriteError> {
        Ok(self.store.find_transaction(id).await?)
    }

    /// Load an account's balance projection (read-only).
    pub async fn get_balance(
        &self,
        account_id: AccountId,
    ) -> Result<Option<BalanceProjection>, WriteError> {
        Ok(self.store.find_balance(account_id).await?)
    }

    /// Page through an account's history, newest first (read-only).
    pub async fn list_transactions(
        &self,
        account_id: AccountId,
        page: PageRequest,
        range: TimeRange,
    ) -> Result<TransactionPage, WriteError> {
        Ok(self.store.list_transactions(account_id, page, range).await?)
    }

    async fn resolve_replay(
        &self,
        marker: &IdempotencyRecord,
    ) -> Result<TransactionRecord, WriteError> {
        match self.store.find_transaction(marker.transaction_id()).await? {
            Some(record) => {
                tracing::info!(
                    transaction_id = %record.id(),
                    "idempotent replay detected; returning existing transaction"
                );
                Ok(record)
            }
            None => {
                tracing::warn!(
                    transaction_id = %marker.transaction_id(),
                    "idempotency record found but its transaction does not exist"
                );
                Err(WriteError::InconsistentIdempotentState(format!(
                    "idempotency record references missing transaction {}",
                    marker.transaction_id()
                )))
            }
        }
    }
}
