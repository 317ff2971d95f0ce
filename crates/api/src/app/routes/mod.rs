use axum::{
    routing::{get, post},
    Router,
};

pub mod accounts;
pub mod system;
pub mod transactions;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/api/v1/accounts", post(accounts::open_account))
        .route("/api/v1/accounts/:account_id/balance", get(accounts::get_balance))
        .route(
            "/api/v1/accounts/:account_id/transactions",
            get(accounts::list_transactions),
        )
        .nest("/api/v1/transaction", transactions::router())
}
