//! Persistence gateway for the ledger write pipeline.
//!
//! This module defines the transactional storage boundary the write
//! coordinator talks to, without making any storage assumptions. The one
//! non-negotiable contract is [`LedgerStore::commit_ledger_write`]: the
//! transaction record, its idempotency marker and the new balance state are
//! persisted as one unit or not at all.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, PageRequest, StoreError, TimeRange, TransactionPage};
