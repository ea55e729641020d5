use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use corebank_core::{AccountId, TransactionId};
use corebank_ledger::{BalanceProjection, IdempotencyKey, IdempotencyRecord, TransactionRecord};

use super::r#trait::{LedgerStore, PageRequest, StoreError, TimeRange, TransactionPage};

#[derive(Debug, Default)]
struct State {
    transactions: HashMap<TransactionId, TransactionRecord>,
    idempotency: HashMap<IdempotencyKey, IdempotencyRecord>,
    balances: HashMap<AccountId, BalanceProjection>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. The single write lock is the atomic unit: every
/// check and mutation of `commit_ledger_write` happens under it, so no
/// partially applied write is ever observable.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Storage("lock poisoned".to_string())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn find_idempotency_record(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.idempotency.get(key).cloned())
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn find_balance(
        &self,
        account_id: AccountId,
    ) -> Result<Option<BalanceProjection>, StoreError> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.balances.get(&account_id).cloned())
    }

    async fn commit_ledger_write(
        &self,
        transaction: &TransactionRecord,
        idempotency: &IdempotencyRecord,
        balance: &BalanceProjection,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;

        // Key uniqueness first: it decides between replay and conflict.
        if state.idempotency.contains_key(idempotency.key()) {
            return Err(StoreError::DuplicateKey);
        }

        // Compare-and-swap on the balance row version.
        let current_version = state
            .balances
            .get(&balance.account_id())
            .map(|b| b.version())
            .unwrap_or(0);
        if current_version != balance.version() {
            return Err(StoreError::Concurrency(format!(
                "balance version mismatch for account {}: expected {}, found {}",
                balance.account_id(),
                balance.version(),
                current_version
            )));
        }

        state
            .transactions
            .insert(transaction.id(), transaction.clone());
        state
            .idempotency
            .insert(idempotency.key().clone(), idempotency.clone());
        state.balances.insert(
            balance.account_id(),
            BalanceProjection::from_stored(
                balance.account_id(),
                balance.current_balance(),
                balance.updated_at(),
                balance.version() + 1,
            ),
        );

        Ok(())
    }

    async fn list_transactions(
        &self,
        account_id: AccountId,
        page: PageRequest,
        range: TimeRange,
    ) -> Result<TransactionPage, StoreError> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;

        let mut matching: Vec<&TransactionRecord> = state
            .transactions
            .values()
            .filter(|t| t.account_id() == account_id && range.contains(t.created_at()))
            .collect();

        // Newest first; ids are time-ordered, so they break created_at ties.
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().as_uuid().cmp(a.id().as_uuid()))
        });

        let total_items = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect();

        Ok(TransactionPage {
            items,
            page: page.page(),
            page_size: page.page_size(),
            total_items,
        })
    }
}
