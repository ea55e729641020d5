//! Infrastructure layer: persistence gateway and write coordination.

pub mod ledger_store;
pub mod writer;

#[cfg(test)]
mod integration_tests;

pub use ledger_store::{
    InMemoryLedgerStore, LedgerStore, PageRequest, PostgresLedgerStore, StoreError, TimeRange,
    TransactionPage,
};
pub use writer::{LedgerWriter, OverdraftPolicy, WriteError};
