use chrono::{DateTime, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use corebank_core::{AccountId, DomainError, DomainResult, Money, TransactionId};

/// Upper bound on the free-text description carried by a transaction.
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// Direction of the money movement (the only thing balance math looks at).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionKind::Credit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "credit" => Ok(TransactionKind::Credit),
            "debit" => Ok(TransactionKind::Debit),
            other => Err(DomainError::validation(format!(
                "invalid transaction kind '{other}': use credit or debit"
            ))),
        }
    }
}

/// Business reason for the movement. Informational only; never feeds into
/// balance arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Deposit,
    Withdraw,
    TransferIn,
    TransferOut,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Deposit => "deposit",
            OperationType::Withdraw => "withdraw",
            OperationType::TransferIn => "transfer_in",
            OperationType::TransferOut => "transfer_out",
        }
    }
}

impl FromStr for OperationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deposit" => Ok(OperationType::Deposit),
            "withdraw" => Ok(OperationType::Withdraw),
            "transfer_in" => Ok(OperationType::TransferIn),
            "transfer_out" => Ok(OperationType::TransferOut),
            other => Err(DomainError::validation(format!(
                "invalid operation '{other}': use deposit, withdraw, transfer_in or transfer_out"
            ))),
        }
    }
}

/// One applied money movement (append-only fact).
///
/// `balance_after` is a snapshot of the account balance immediately after
/// this record was applied; it is persisted once and never recomputed.
/// Fields are private so a record can only exist in a valid state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    id: TransactionId,
    account_id: AccountId,
    kind: TransactionKind,
    operation: OperationType,
    amount: Money,
    balance_after: Money,
    description: Option<String>,
    correlation_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Build a new record, generating its id and timestamp server-side.
    ///
    /// Rejects non-positive amounts and overlong descriptions; callers get a
    /// record only for state that is allowed to be persisted.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: AccountId,
        kind: TransactionKind,
        operation: OperationType,
        amount: Money,
        balance_after: Money,
        description: Option<String>,
        correlation_id: Option<Uuid>,
    ) -> DomainResult<Self> {
        if !amount.is_positive() {
            return Err(DomainError::validation("amount must be greater than zero"));
        }
        if let Some(ref d) = description {
            if d.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(DomainError::validation(format!(
                    "description exceeds {MAX_DESCRIPTION_LEN} characters"
                )));
            }
        }

        Ok(Self {
            id: TransactionId::new(),
            account_id,
            kind,
            operation,
            amount,
            balance_after,
            description,
            correlation_id,
            created_at: Utc::now(),
        })
    }

    /// Rehydrate a record from storage.
    ///
    /// Trusts the persisted values; validation happened when the record was
    /// first created.
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored(
        id: TransactionId,
        account_id: AccountId,
        kind: TransactionKind,
        operation: OperationType,
        amount: Money,
        balance_after: Money,
        description: Option<String>,
        correlation_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            kind,
            operation,
            amount,
            balance_after,
            description,
            correlation_id,
            created_at,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn operation(&self) -> OperationType {
        self.operation
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn balance_after(&self) -> Money {
        self.balance_after
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The amount with its direction applied (credits positive, debits negative).
    pub fn signed_amount(&self) -> Money {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}
