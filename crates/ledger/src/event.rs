use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use corebank_core::{AccountId, Money, TransactionId};
use corebank_events::Event;

use crate::transaction::TransactionKind;

/// Event: a transaction was committed to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub amount: Money,
    pub kind: TransactionKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    TransactionRecorded(TransactionRecorded),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::TransactionRecorded(_) => "ledger.transaction.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::TransactionRecorded(e) => e.occurred_at,
        }
    }
}
