use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use corebank_core::{AccountId, TransactionId};
use corebank_ledger::{BalanceProjection, IdempotencyKey, IdempotencyRecord, TransactionRecord};

/// Persistence gateway operation error.
///
/// These are **infrastructure errors**; domain failures (validation,
/// invariants) never reach the store. The two named variants are the ones
/// the write coordinator must tell apart, because each has its own recovery
/// path.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The balance row changed between read and write (version mismatch).
    /// The whole operation is safe to retry from a fresh read.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// The idempotency key already exists: a request carrying the same key
    /// committed first. Resolved by the caller as success-by-replay.
    #[error("idempotency key already exists")]
    DuplicateKey,

    /// Any other storage failure. The atomic unit was rolled back; nothing
    /// was persisted.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Pagination request for transaction listings.
///
/// Non-positive inputs fall back to page 1 / page size 50.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_PAGE_SIZE: u32 = 50;

    /// Build a page request, substituting defaults for non-positive values.
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: u32::try_from(page).ok().filter(|p| *p >= 1).unwrap_or(Self::DEFAULT_PAGE),
            page_size: u32::try_from(page_size)
                .ok()
                .filter(|s| *s >= 1)
                .unwrap_or(Self::DEFAULT_PAGE_SIZE),
        }
    }

    /// First page with the default size.
    pub fn first() -> Self {
        Self::default()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of items skipped before this page starts.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

/// Optional inclusive creation-time bounds for transaction listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// One page of transaction history plus the total item count.
#[derive(Debug, Clone)]
pub struct TransactionPage {
    pub items: Vec<TransactionRecord>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
}

/// Transactional read/write access to the three ledger entities.
///
/// ## Commit Semantics
///
/// `commit_ledger_write()` persists the transaction record, the idempotency
/// marker and the balance projection **atomically**: all three or none.
/// Implementations must detect two distinct races:
///
/// - **Balance version mismatch**: the projection's `version()` is the token
///   read before the in-memory mutation. A projection at version 0 must
///   insert a brand-new row; any other version must replace exactly the row
///   at that version, advancing it by one. Both paths surface
///   [`StoreError::Concurrency`] when another write landed in between.
/// - **Idempotency-key duplication**: a uniqueness constraint on the
///   (request id, endpoint) key is the final authority when two requests
///   with the same key race past the application-level lookup; the losing
///   insert surfaces [`StoreError::DuplicateKey`].
///
/// ## Read Semantics
///
/// The finders and `list_transactions()` are plain reads: they never mutate
/// state and never participate in the write unit's concurrency token.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Look up the idempotency marker for a key, if one was ever committed.
    async fn find_idempotency_record(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Load one transaction by id.
    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, StoreError>;

    /// Load the balance projection for an account. `None` means no
    /// transaction was ever committed for it.
    async fn find_balance(
        &self,
        account_id: AccountId,
    ) -> Result<Option<BalanceProjection>, StoreError>;

    /// Atomically persist one ledger write (see trait-level docs).
    async fn commit_ledger_write(
        &self,
        transaction: &TransactionRecord,
        idempotency: &IdempotencyRecord,
        balance: &BalanceProjection,
    ) -> Result<(), StoreError>;

    /// Page through an account's history, newest first, with the total count.
    async fn list_transactions(
        &self,
        account_id: AccountId,
        page: PageRequest,
        range: TimeRange,
    ) -> Result<TransactionPage, StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn find_idempotency_record(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        (**self).find_idempotency_record(key).await
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        (**self).find_transaction(id).await
    }

    async fn find_balance(
        &self,
        account_id: AccountId,
    ) -> Result<Option<BalanceProjection>, StoreError> {
        (**self).find_balance(account_id).await
    }

    async fn commit_ledger_write(
        &self,
        transaction: &TransactionRecord,
        idempotency: &IdempotencyRecord,
        balance: &BalanceProjection,
    ) -> Result<(), StoreError> {
        (**self)
            .commit_ledger_write(transaction, idempotency, balance)
            .await
    }

    async fn list_transactions(
        &self,
        account_id: AccountId,
        page: PageRequest,
        range: TimeRange,
    ) -> Result<TransactionPage, StoreError> {
        (**self).list_transactions(account_id, page, range).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_pagination_falls_back_to_defaults() {
        let page = PageRequest::new(0, -10);
        assert_eq!(page.page(), 1);
        assert_eq!(page.page_size(), 50);

        let page = PageRequest::new(3, 20);
        assert_eq!(page.page(), 3);
        assert_eq!(page.page_size(), 20);
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn time_range_bounds_are_inclusive() {
        let now = Utc::now();
        let range = TimeRange {
            from: Some(now),
            to: Some(now),
        };
        assert!(range.contains(now));
        assert!(!range.contains(now - chrono::Duration::seconds(1)));
        assert!(TimeRange::default().contains(now));
    }
}
