use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Response,
};

use custodia_ledger::GetBalance;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::UserContext;

pub async fn open_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> Response {
    match services.handlers.open_account(user.user_id()).await {
        Ok(snapshot) => dto::envelope(StatusCode::CREATED, dto::BalanceResponse::from(snapshot)),
        Err(e) => errors::wallet_error_to_response(e),
    }
}

pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(account_id): Path<String>,
) -> Response {
    let account_id = match dto::parse_account_id(&account_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let query = GetBalance {
        account_id,
        requested_by: user.user_id(),
    };
    match services.handlers.get_balance(query).await {
        Ok(snapshot) => dto::envelope(StatusCode::OK, dto::BalanceResponse::from(snapshot)),
        Err(e) => errors::wallet_error_to_response(e),
    }
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(account_id): Path<String>,
) -> Response {
    let account_id = match dto::parse_account_id(&account_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let query = GetBalance {
        account_id,
        requested_by: user.user_id(),
    };
    match services.handlers.history(query).await {
        Ok(items) => dto::envelope(
            StatusCode::OK,
            dto::TransactionsResponse { account_id, items },
        ),
        Err(e) => errors::wallet_error_to_response(e),
    }
}
