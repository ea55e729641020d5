//! `corebank-ledger` — the ledger write domain.
//!
//! Transactions are append-only facts; the balance projection is a cached
//! running total of those facts; idempotency records pin a client request
//! identity to the transaction it produced the first time it was seen.

pub mod balance;
pub mod command;
pub mod event;
pub mod idempotency;
pub mod transaction;

pub use balance::{BalanceProjection, apply_transaction};
pub use command::CreateTransaction;
pub use event::{LedgerEvent, TransactionRecorded};
pub use idempotency::{CREATE_TRANSACTION_ENDPOINT, IdempotencyKey, IdempotencyRecord};
pub use transaction::{MAX_DESCRIPTION_LEN, OperationType, TransactionKind, TransactionRecord};
