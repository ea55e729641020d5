use axum::Router;

pub mod accounts;
pub mod system;
pub mod transactions;

/// Router for all ledger endpoints (mounted under `/api/ledger`).
pub fn router() -> Router {
    Router::new()
        .merge(transactions::router())
        .merge(accounts::router())
}
