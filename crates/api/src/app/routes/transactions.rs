use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use corebank_core::{AccountId, Money, RequestId, TransactionId};
use corebank_ledger::CreateTransaction;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/transactions", post(create_transaction))
        .route("/transactions/:id", get(get_transaction))
        .route(
            "/accounts/:account_id/transactions",
            get(list_transactions),
        )
}

pub async fn create_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateTransactionRequest>,
) -> axum::response::Response {
    let kind = match errors::parse_kind(&body.kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let operation = match errors::parse_operation(&body.operation) {
        Ok(op) => op,
        Err(resp) => return resp,
    };

    let cmd = match CreateTransaction::new(
        RequestId::from_uuid(body.request_id),
        AccountId::from_uuid(body.account_id),
        kind,
        operation,
        Money::new(body.amount),
        body.description,
        body.correlation_id,
    ) {
        Ok(cmd) => cmd,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
        }
    };

    match services.writer().create_transaction(&cmd).await {
        Ok(record) => {
            (StatusCode::CREATED, Json(dto::transaction_to_json(&record))).into_response()
        }
        Err(e) => errors::write_error_to_response(e),
    }
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    match services
        .writer()
        .get_transaction(TransactionId::from_uuid(id))
        .await
    {
        Ok(Some(record)) => (StatusCode::OK, Json(dto::transaction_to_json(&record))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "transaction not found"),
        Err(e) => errors::write_error_to_response(e),
    }
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<dto::ListTransactionsQuery>,
) -> axum::response::Response {
    match services
        .writer()
        .list_transactions(
            AccountId::from_uuid(account_id),
            query.page_request(),
            query.time_range(),
        )
        .await
    {
        Ok(page) => (StatusCode::OK, Json(dto::page_to_json(&page))).into_response(),
        Err(e) => errors::write_error_to_response(e),
    }
}
