use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::Response,
    routing::post,
    Json, Router,
};

use custodia_ledger::{BankTransferOut, ExternalDestination, TopUp, Transfer, Withdraw};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/withdraw", post(withdraw))
        .route("/bank-transfer", post(bank_transfer))
        .route("/top-up", post(top_up))
        .route("/transfer", post(transfer))
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    payload: Result<Json<dto::WithdrawRequest>, JsonRejection>,
) -> Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let account_id = match dto::parse_account_id(&body.account_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = Withdraw {
        account_id,
        requested_by: user.user_id(),
        amount: body.amount,
        idempotency_key: body.idempotency_key,
    };
    match services.handlers.withdraw(cmd).await {
        Ok(receipt) => dto::envelope(StatusCode::OK, receipt),
        Err(e) => errors::wallet_error_to_response(e),
    }
}

pub async fn bank_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    payload: Result<Json<dto::BankTransferRequest>, JsonRejection>,
) -> Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let account_id = match dto::parse_account_id(&body.account_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = BankTransferOut {
        account_id,
        requested_by: user.user_id(),
        amount: body.amount,
        destination: ExternalDestination {
            account: body.to,
            bank_name: body.bank_name,
        },
        idempotency_key: body.idempotency_key,
    };
    match services.handlers.bank_transfer_out(cmd).await {
        Ok(receipt) => dto::envelope(StatusCode::OK, receipt),
        Err(e) => errors::wallet_error_to_response(e),
    }
}

pub async fn top_up(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    payload: Result<Json<dto::TopUpRequest>, JsonRejection>,
) -> Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let account_id = match dto::parse_account_id(&body.account_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let cmd = TopUp {
        account_id,
        requested_by: user.user_id(),
        amount: body.amount,
        idempotency_key: body.idempotency_key,
    };
    match services.handlers.top_up(cmd).await {
        Ok(receipt) => dto::envelope(StatusCode::OK, receipt),
        Err(e) => errors::wallet_error_to_response(e),
    }
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    payload: Result<Json<dto::TransferRequest>, JsonRejection>,
) -> Response {
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let (account_id, to_account_id) = match (
        dto::parse_account_id(&body.account_id),
        dto::parse_account_id(&body.to_account_id),
    ) {
        (Ok(from), Ok(to)) => (from, to),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    let cmd = Transfer {
        account_id,
        to_account_id,
        requested_by: user.user_id(),
        amount: body.amount,
        idempotency_key: body.idempotency_key,
    };
    match services.handlers.transfer(cmd).await {
        Ok(receipt) => dto::envelope(StatusCode::OK, receipt),
        Err(e) => errors::wallet_error_to_response(e),
    }
}
