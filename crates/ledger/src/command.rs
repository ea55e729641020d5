use uuid::Uuid;

use corebank_core::{AccountId, DomainError, DomainResult, Money, RequestId};

use crate::transaction::{MAX_DESCRIPTION_LEN, OperationType, TransactionKind};

/// Validated intent to record one money movement.
///
/// Construction is the validation gate of the write pipeline: a
/// `CreateTransaction` value only exists for input that passed the amount,
/// request-identity and description checks, so by the time the coordinator
/// sees one, no validation failure can occur past the persistence boundary.
/// Deliberately not deserializable; the HTTP layer owns the wire shape and
/// has to come through this constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTransaction {
    request_id: RequestId,
    account_id: AccountId,
    kind: TransactionKind,
    operation: OperationType,
    amount: Money,
    description: Option<String>,
    correlation_id: Option<Uuid>,
}

impl CreateTransaction {
    pub fn new(
        request_id: RequestId,
        account_id: AccountId,
        kind: TransactionKind,
        operation: OperationType,
        amount: Money,
        description: Option<String>,
        correlation_id: Option<Uuid>,
    ) -> DomainResult<Self> {
        if request_id.is_nil() {
            return Err(DomainError::validation(
                "request_id is required for idempotency",
            ));
        }
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
            request_id,
            account_id,
            kind,
            operation,
            amount,
            description,
            correlation_id,
        })
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
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

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    fn valid() -> DomainResult<CreateTransaction> {
        CreateTransaction::new(
            RequestId::new(),
            AccountId::new(),
            TransactionKind::Credit,
            OperationType::Deposit,
            Money::from_str("100.00").unwrap(),
            None,
            None,
        )
    }

    #[test]
    fn valid_command_is_accepted() {
        assert!(valid().is_ok());
    }

    #[test]
    fn nil_request_id_is_rejected() {
        let err = CreateTransaction::new(
            RequestId::from_uuid(Uuid::nil()),
            AccountId::new(),
            TransactionKind::Credit,
            OperationType::Deposit,
            Money::from_str("100.00").unwrap(),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_and_negative_amounts_are_rejected() {
        for s in ["0.00", "-5.00"] {
            let err = CreateTransaction::new(
                RequestId::new(),
                AccountId::new(),
                TransactionKind::Debit,
                OperationType::Withdraw,
                Money::from_str(s).unwrap(),
                None,
                None,
            )
            .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }
}
