//! Postgres-backed ledger store implementation.
//!
//! Persists the three ledger entities with the atomic unit implemented as a
//! single database transaction. Schema management is handled outside this
//! crate; the expected tables are:
//!
//! ```sql
//! CREATE TABLE ledger_transactions (
//!     id             UUID PRIMARY KEY,
//!     account_id     UUID NOT NULL,
//!     kind           TEXT NOT NULL,
//!     operation      TEXT NOT NULL,
//!     amount         NUMERIC(18, 2) NOT NULL,
//!     balance_after  NUMERIC(18, 2) NOT NULL,
//!     description    TEXT,
//!     correlation_id UUID,
//!     created_at     TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX ledger_transactions_account_created
//!     ON ledger_transactions (account_id, created_at DESC);
//!
//! CREATE TABLE idempotent_requests (
//!     request_id     UUID NOT NULL,
//!     endpoint       TEXT NOT NULL,
//!     transaction_id UUID NOT NULL,
//!     created_at     TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (request_id, endpoint)
//! );
//!
//! CREATE TABLE account_balances (
//!     account_id      UUID PRIMARY KEY,
//!     current_balance NUMERIC(18, 2) NOT NULL,
//!     updated_at      TIMESTAMPTZ NOT NULL,
//!     version         BIGINT NOT NULL
//! );
//! ```
//!
//! ## Error Mapping
//!
//! Unique violations (`23505`) are the interesting failures and are mapped
//! by the statement that hit them: on the idempotency insert they become
//! [`StoreError::DuplicateKey`] (two requests raced on one key), on the
//! balance insert they become [`StoreError::Concurrency`] (two writers raced
//! on lazily creating the same balance row). A balance update matching zero
//! rows is the version-mismatch case of the same conflict. Everything else
//! maps to [`StoreError::Storage`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core::str::FromStr;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Row};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use corebank_core::{AccountId, Money, RequestId, TransactionId};
use corebank_ledger::{
    BalanceProjection, IdempotencyKey, IdempotencyRecord, OperationType, TransactionKind,
    TransactionRecord,
};

use super::r#trait::{LedgerStore, PageRequest, StoreError, TimeRange, TransactionPage};

/// Postgres-backed ledger store.
///
/// Uses the SQLx connection pool, which is thread-safe; the store can be
/// shared freely across request handlers. Every multi-statement write runs
/// inside one database transaction; on any error the transaction guard is
/// dropped and SQLx rolls it back, so no partial write is observable.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(
        skip(self, key),
        fields(request_id = %key.request_id(), endpoint = key.endpoint()),
        err
    )]
    async fn find_idempotency_record(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT request_id, endpoint, transaction_id, created_at
            FROM idempotent_requests
            WHERE request_id = $1 AND endpoint = $2
            "#,
        )
        .bind(key.request_id().as_uuid())
        .bind(key.endpoint())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_idempotency_record", e))?;

        row.map(|row| {
            IdempotencyRow::from_row(&row)
                .map(IdempotencyRecord::from)
                .map_err(|e| {
                    StoreError::Storage(format!("failed to decode idempotency row: {e}"))
                })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(transaction_id = %id), err)]
    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, kind, operation, amount, balance_after,
                   description, correlation_id, created_at
            FROM ledger_transactions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_transaction", e))?;

        row.map(|row| {
            TransactionRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("failed to decode transaction row: {e}")))
                .and_then(TransactionRow::into_record)
        })
        .transpose()
    }

    #[instrument(skip(self), fields(account_id = %account_id), err)]
    async fn find_balance(
        &self,
        account_id: AccountId,
    ) -> Result<Option<BalanceProjection>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT account_id, current_balance, updated_at, version
            FROM account_balances
            WHERE account_id = $1
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_balance", e))?;

        row.map(|row| {
            BalanceRow::from_row(&row)
                .map(BalanceProjection::from)
                .map_err(|e| StoreError::Storage(format!("failed to decode balance row: {e}")))
        })
        .transpose()
    }

    #[instrument(
        skip(self, transaction, idempotency, balance),
        fields(
            transaction_id = %transaction.id(),
            account_id = %transaction.account_id(),
            balance_version = balance.version()
        ),
        err
    )]
    async fn commit_ledger_write(
        &self,
        transaction: &TransactionRecord,
        idempotency: &IdempotencyRecord,
        balance: &BalanceProjection,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO ledger_transactions (
                id, account_id, kind, operation, amount, balance_after,
                description, correlation_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(transaction.id().as_uuid())
        .bind(transaction.account_id().as_uuid())
        .bind(transaction.kind().as_str())
        .bind(transaction.operation().as_str())
        .bind(transaction.amount().as_decimal())
        .bind(transaction.balance_after().as_decimal())
        .bind(transaction.description())
        .bind(transaction.correlation_id())
        .bind(transaction.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO idempotent_requests (request_id, endpoint, transaction_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(idempotency.key().request_id().as_uuid())
        .bind(idempotency.key().endpoint())
        .bind(idempotency.transaction_id().as_uuid())
        .bind(idempotency.created_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateKey
            } else {
                map_sqlx_error("insert_idempotency", e)
            }
        })?;

        if balance.version() == 0 {
            // First write for this account: the row must not exist yet.
            sqlx::query(
                r#"
                INSERT INTO account_balances (account_id, current_balance, updated_at, version)
                VALUES ($1, $2, $3, 1)
                "#,
            )
            .bind(balance.account_id().as_uuid())
            .bind(balance.current_balance().as_decimal())
            .bind(balance.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Concurrency(format!(
                        "balance row for account {} was created concurrently",
                        balance.account_id()
                    ))
                } else {
                    map_sqlx_error("insert_balance", e)
                }
            })?;
        } else {
            let result = sqlx::query(
                r#"
                UPDATE account_balances
                SET current_balance = $2, updated_at = $3, version = $4
                WHERE account_id = $1 AND version = $5
                "#,
            )
            .bind(balance.account_id().as_uuid())
            .bind(balance.current_balance().as_decimal())
            .bind(balance.updated_at())
            .bind((balance.version() + 1) as i64)
            .bind(balance.version() as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_balance", e))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Concurrency(format!(
                    "balance version mismatch for account {}: version {} is no longer current",
                    balance.account_id(),
                    balance.version()
                )));
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(
        skip(self),
        fields(account_id = %account_id, page = page.page(), page_size = page.page_size()),
        err
    )]
    async fn list_transactions(
        &self,
        account_id: AccountId,
        page: PageRequest,
        range: TimeRange,
    ) -> Result<TransactionPage, StoreError> {
        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM ledger_transactions
            WHERE account_id = $1
                AND ($2::timestamptz IS NULL OR created_at >= $2)
                AND ($3::timestamptz IS NULL OR created_at <= $3)
            "#,
        )
        .bind(account_id.as_uuid())
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_transactions", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Storage(format!("failed to read count: {e}")))?;

        let rows = sqlx::query(
            r#"
            SELECT id, account_id, kind, operation, amount, balance_after,
                   description, correlation_id, created_at
            FROM ledger_transactions
            WHERE account_id = $1
                AND ($2::timestamptz IS NULL OR created_at >= $2)
                AND ($3::timestamptz IS NULL OR created_at <= $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(account_id.as_uuid())
        .bind(range.from)
        .bind(range.to)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let decoded = TransactionRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("failed to decode transaction row: {e}")))?;
            items.push(decoded.into_record()?);
        }

        Ok(TransactionPage {
            items,
            page: page.page(),
            page_size: page.page_size(),
            total_items: total as u64,
        })
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct TransactionRow {
    id: Uuid,
    account_id: Uuid,
    kind: String,
    operation: String,
    amount: Decimal,
    balance_after: Decimal,
    description: Option<String>,
    correlation_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for TransactionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransactionRow {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            kind: row.try_get("kind")?,
            operation: row.try_get("operation")?,
            amount: row.try_get("amount")?,
            balance_after: row.try_get("balance_after")?,
            description: row.try_get("description")?,
            correlation_id: row.try_get("correlation_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TransactionRow {
    fn into_record(self) -> Result<TransactionRecord, StoreError> {
        let kind = TransactionKind::from_str(&self.kind)
            .map_err(|e| StoreError::Storage(format!("corrupt kind column: {e}")))?;
        let operation = OperationType::from_str(&self.operation)
            .map_err(|e| StoreError::Storage(format!("corrupt operation column: {e}")))?;

        Ok(TransactionRecord::from_stored(
            TransactionId::from_uuid(self.id),
            AccountId::from_uuid(self.account_id),
            kind,
            operation,
            Money::new(self.amount),
            Money::new(self.balance_after),
            self.description,
            self.correlation_id,
            self.created_at,
        ))
    }
}

#[derive(Debug)]
struct IdempotencyRow {
    request_id: Uuid,
    endpoint: String,
    transaction_id: Uuid,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for IdempotencyRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(IdempotencyRow {
            request_id: row.try_get("request_id")?,
            endpoint: row.try_get("endpoint")?,
            transaction_id: row.try_get("transaction_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<IdempotencyRow> for IdempotencyRecord {
    fn from(row: IdempotencyRow) -> Self {
        IdempotencyRecord::from_stored(
            IdempotencyKey::new(RequestId::from_uuid(row.request_id), row.endpoint),
            TransactionId::from_uuid(row.transaction_id),
            row.created_at,
        )
    }
}

#[derive(Debug)]
struct BalanceRow {
    account_id: Uuid,
    current_balance: Decimal,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for BalanceRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(BalanceRow {
            account_id: row.try_get("account_id")?,
            current_balance: row.try_get("current_balance")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
        })
    }
}

impl From<BalanceRow> for BalanceProjection {
    fn from(row: BalanceRow) -> Self {
        BalanceProjection::from_stored(
            AccountId::from_uuid(row.account_id),
            Money::new(row.current_balance),
            row.updated_at,
            row.version as u64,
        )
    }
}
