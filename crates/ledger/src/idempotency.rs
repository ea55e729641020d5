use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use corebank_core::{RequestId, TransactionId};

/// Logical endpoint discriminator for create-transaction idempotency keys.
///
/// Keys are scoped to (request id, endpoint) so the same client request id
/// could safely be reused against a different operation in the future.
pub const CREATE_TRANSACTION_ENDPOINT: &str = "POST /api/ledger/transactions";

/// Composite idempotency key: client request identity + logical endpoint.
///
/// Uniqueness of this key is enforced by the persistence layer, which is the
/// final authority when two requests carrying the same key race.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    request_id: RequestId,
    endpoint: String,
}

impl IdempotencyKey {
    pub fn new(request_id: RequestId, endpoint: impl Into<String>) -> Self {
        Self {
            request_id,
            endpoint: endpoint.into(),
        }
    }

    /// Key for the create-transaction operation.
    pub fn create_transaction(request_id: RequestId) -> Self {
        Self::new(request_id, CREATE_TRANSACTION_ENDPOINT)
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Marker recording that a request identity has already been processed.
///
/// Points at the transaction produced the first time the key was seen.
/// Created in the same atomic unit as that transaction, exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    key: IdempotencyKey,
    transaction_id: TransactionId,
    created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(key: IdempotencyKey, transaction_id: TransactionId) -> Self {
        Self {
            key,
            transaction_id,
            created_at: Utc::now(),
        }
    }

    /// Rehydrate a marker from storage.
    pub fn from_stored(
        key: IdempotencyKey,
        transaction_id: TransactionId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            transaction_id,
            created_at,
        }
    }

    pub fn key(&self) -> &IdempotencyKey {
        &self.key
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
