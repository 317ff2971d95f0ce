use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use custodia_core::{AccountId, UserId};
use custodia_ledger::{AccountSnapshot, LedgerEntry};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub amount: i64,
    pub account_id: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransferRequest {
    pub amount: i64,
    pub account_id: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub bank_name: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    pub amount: i64,
    pub account_id: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub amount: i64,
    pub account_id: String,
    pub to_account_id: String,
    pub idempotency_key: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

/// Every response body: `{ _id, data, timestamp }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

pub fn envelope<T: Serialize>(status: StatusCode, data: T) -> Response {
    let body = Envelope {
        id: Uuid::now_v7(),
        data,
        timestamp: Utc::now(),
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub user_id: UserId,
    pub account_number: String,
    pub balance: i64,
    pub last_transaction: DateTime<Utc>,
}

impl From<AccountSnapshot> for BalanceResponse {
    fn from(s: AccountSnapshot) -> Self {
        Self {
            account_id: s.account_id,
            user_id: s.owner_id,
            account_number: s.account_number,
            balance: s.balance,
            last_transaction: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub account_id: AccountId,
    pub items: Vec<LedgerEntry>,
}

// -------------------------
// Mapping helpers
// -------------------------

pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(v)| v).map_err(|rejection| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "invalid request body",
            vec![rejection.body_text()],
        )
    })
}

pub fn parse_account_id(raw: &str) -> Result<AccountId, Response> {
    raw.trim()
        .parse::<AccountId>()
        .map_err(|e| errors::invalid_id(e.to_string()))
}
