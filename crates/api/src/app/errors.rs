use axum::http::StatusCode;
use axum::response::IntoResponse;
use core::str::FromStr;
use serde_json::json;

use corebank_infra::WriteError;
use corebank_ledger::{OperationType, TransactionKind};

pub fn write_error_to_response(err: WriteError) -> axum::response::Response {
    match err {
        WriteError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        WriteError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        WriteError::InconsistentIdempotentState(msg) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "inconsistent_idempotent_state",
            msg,
        ),
        WriteError::Store(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_kind(s: &str) -> Result<TransactionKind, axum::response::Response> {
    TransactionKind::from_str(s)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_kind", e.to_string()))
}

pub fn parse_operation(s: &str) -> Result<OperationType, axum::response::Response> {
    OperationType::from_str(s)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_operation", e.to_string()))
}
