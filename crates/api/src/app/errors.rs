use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;

use custodia_infra::WalletError;

use crate::app::dto;

pub fn wallet_error_to_response(err: WalletError) -> Response {
    match err {
        WalletError::InvalidAmount { amount, minimum } => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_amount",
            "invalid amount",
            vec![format!("amount {amount} is below the minimum of {minimum}")],
        ),
        WalletError::InvalidRequest(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_request", "invalid request", vec![msg])
        }
        WalletError::InsufficientBalance {
            attempted,
            available,
        } => json_error(
            StatusCode::BAD_REQUEST,
            "insufficient_balance",
            "insufficient balance",
            vec![format!("attempted {attempted}, available {available}")],
        ),
        WalletError::Forbidden => json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "forbidden",
            vec!["This account does not belong to the user".to_string()],
        ),
        WalletError::NotFound(id) => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            "account not found",
            vec![format!("account with id: {id} not exist")],
        ),
        WalletError::IdempotencyConflict(msg) => json_error(
            StatusCode::CONFLICT,
            "idempotency_conflict",
            "idempotency conflict",
            vec![msg],
        ),
        WalletError::StoreUnavailable(msg) => {
            tracing::error!(error = %msg, "request failed on store");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_unavailable",
                "an error occurred",
                Vec::new(),
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Vec<String>,
) -> Response {
    dto::envelope(
        status,
        json!({
            "error": code,
            "message": message.into(),
            "details": details,
        }),
    )
}

pub fn invalid_id(detail: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid id", vec![detail.into()])
}
