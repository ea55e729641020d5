use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use corebank_core::AccountId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/accounts/:account_id/balance", get(get_balance))
        .route("/accounts/:account_id/statement", get(get_statement))
}

pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Path(account_id): Path<Uuid>,
) -> axum::response::Response {
    match services
        .writer()
        .get_balance(AccountId::from_uuid(account_id))
        .await
    {
        Ok(Some(balance)) => (StatusCode::OK, Json(dto::balance_to_json(&balance))).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            "no balance recorded for this account",
        ),
        Err(e) => errors::write_error_to_response(e),
    }
}

pub async fn get_statement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<dto::ListTransactionsQuery>,
) -> axum::response::Response {
    let account_id = AccountId::from_uuid(account_id);

    let balance = match services.writer().get_balance(account_id).await {
        Ok(Some(balance)) => balance,
        Ok(None) => {
            return errors::json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                "no balance recorded for this account",
            );
        }
        Err(e) => return errors::write_error_to_response(e),
    };

    match services
        .writer()
        .list_transactions(account_id, query.page_request(), query.time_range())
        .await
    {
        Ok(page) => {
            (StatusCode::OK, Json(dto::statement_to_json(&balance, &page))).into_response()
        }
        Err(e) => errors::write_error_to_response(e),
    }
}
