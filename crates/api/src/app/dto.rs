use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use corebank_infra::{PageRequest, TimeRange, TransactionPage};
use corebank_ledger::{BalanceProjection, TransactionRecord};

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /api/ledger/transactions`.
///
/// `amount` rides as a decimal string on the wire (rust_decimal's serde
/// form), which keeps fractional cents from ever passing through floats.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub request_id: Uuid,
    pub account_id: Uuid,
    pub kind: String,
    pub operation: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub correlation_id: Option<Uuid>,
}

/// Query parameters shared by the listing/statement endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ListTransactionsQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page.unwrap_or(0), self.page_size.unwrap_or(0))
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            from: self.from,
            to: self.to,
        }
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn transaction_to_json(t: &TransactionRecord) -> Value {
    json!({
        "id": t.id().to_string(),
        "account_id": t.account_id().to_string(),
        "kind": t.kind().as_str(),
        "operation": t.operation().as_str(),
        "amount": t.amount().to_string(),
        "balance_after": t.balance_after().to_string(),
        "description": t.description(),
        "correlation_id": t.correlation_id().map(|c| c.to_string()),
        "created_at": t.created_at().to_rfc3339(),
    })
}

pub fn balance_to_json(b: &BalanceProjection) -> Value {
    json!({
        "account_id": b.account_id().to_string(),
        "current_balance": b.current_balance().to_string(),
        "updated_at": b.updated_at().to_rfc3339(),
    })
}

pub fn page_to_json(page: &TransactionPage) -> Value {
    json!({
        "items": page.items.iter().map(transaction_to_json).collect::<Vec<_>>(),
        "page": page.page,
        "page_size": page.page_size,
        "total_items": page.total_items,
    })
}

/// Statement = balance header + one page of history.
pub fn statement_to_json(balance: &BalanceProjection, page: &TransactionPage) -> Value {
    json!({
        "account_id": balance.account_id().to_string(),
        "current_balance": balance.current_balance().to_string(),
        "updated_at": balance.updated_at().to_rfc3339(),
        "page": page.page,
        "page_size": page.page_size,
        "total_items": page.total_items,
        "items": page.items.iter().map(transaction_to_json).collect::<Vec<_>>(),
    })
}
