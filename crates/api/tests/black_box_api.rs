use chrono::{Duration as ChronoDuration, Utc};
use custodia_api::config::AppConfig;
use custodia_auth::JwtClaims;
use custodia_core::UserId;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod (in-memory store), bound to an ephemeral port.
        let config = AppConfig {
            jwt_secret: JWT_SECRET.to_string(),
            ..AppConfig::default()
        };
        let app = custodia_api::app::build_app(config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(user_id: UserId) -> String {
    let claims = JwtClaims::new(user_id, Utc::now(), ChronoDuration::minutes(10));

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn open_account(client: &reqwest::Client, srv: &TestServer, token: &str) -> String {
    let res = client
        .post(srv.url("/api/v1/accounts"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["data"]["accountId"].as_str().unwrap().to_string()
}

async fn post(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    path: &str,
    payload: Value,
) -> (StatusCode, Value) {
    let res = client
        .post(srv.url(path))
        .bearer_auth(token)
        .json(&payload)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/v1/accounts"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/api/v1/accounts"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn top_up_withdraw_and_balance() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = UserId::new();
    let token = mint_jwt(user);
    let account_id = open_account(&client, &srv, &token).await;

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/api/v1/transaction/top-up",
        json!({ "amount": 100000, "accountId": account_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["type"], "TOP_UP");
    assert_eq!(body["data"]["finalBalance"], 100000);
    assert!(body["_id"].is_string());
    assert!(body["timestamp"].is_string());

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/api/v1/transaction/withdraw",
        json!({ "amount": 50000, "accountId": account_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["type"], "WITHDRAW");
    assert_eq!(body["data"]["amount"], 50000);
    assert_eq!(body["data"]["finalBalance"], 50000);

    let res = client
        .get(srv.url(&format!("/api/v1/accounts/{account_id}/balance")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["balance"], 50000);
    assert_eq!(body["data"]["userId"], user.to_string());

    let res = client
        .get(srv.url(&format!("/api/v1/accounts/{account_id}/transactions")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["kind"], "WITHDRAW");
    assert_eq!(items[1]["amount"], -50000);
    assert_eq!(items[1]["description"], "ATM Cash Withdrawal");
}

#[tokio::test]
async fn business_failures_map_to_status_codes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(UserId::new());
    let account_id = open_account(&client, &srv, &token).await;

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/api/v1/transaction/withdraw",
        json!({ "amount": 49999, "accountId": account_id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "invalid_amount");

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/api/v1/transaction/withdraw",
        json!({ "amount": 100000, "accountId": account_id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "insufficient_balance");

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/api/v1/transaction/bank-transfer",
        json!({ "amount": 60000, "accountId": account_id, "to": "123" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "invalid_request");

    let (status, body) = post(
        &client,
        &srv,
        &token,
        "/api/v1/transaction/top-up",
        json!({ "amount": 10000, "accountId": "not-a-uuid" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], "invalid_id");

    let missing = UserId::new().to_string();
    let res = client
        .get(srv.url(&format!("/api/v1/accounts/{missing}/balance")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["error"], "not_found");
    assert_eq!(
        body["data"]["details"][0],
        format!("account with id: {missing} not exist")
    );
}

#[tokio::test]
async fn non_owner_is_forbidden() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner_token = mint_jwt(UserId::new());
    let stranger_token = mint_jwt(UserId::new());
    let account_id = open_account(&client, &srv, &owner_token).await;

    let (status, _) = post(
        &client,
        &srv,
        &owner_token,
        "/api/v1/transaction/top-up",
        json!({ "amount": 100000, "accountId": account_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &client,
        &srv,
        &stranger_token,
        "/api/v1/transaction/withdraw",
        json!({ "amount": 50000, "accountId": account_id }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["data"]["error"], "forbidden");

    let res = client
        .get(srv.url(&format!("/api/v1/accounts/{account_id}/balance")))
        .bearer_auth(&stranger_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(srv.url(&format!("/api/v1/accounts/{account_id}/balance")))
        .bearer_auth(&owner_token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["balance"], 100000);
}

#[tokio::test]
async fn internal_transfer_and_idempotent_retry() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let alice = mint_jwt(UserId::new());
    let bob = mint_jwt(UserId::new());
    let from = open_account(&client, &srv, &alice).await;
    let to = open_account(&client, &srv, &bob).await;

    post(
        &client,
        &srv,
        &alice,
        "/api/v1/transaction/top-up",
        json!({ "amount": 200000, "accountId": from }),
    )
    .await;

    let request = json!({
        "amount": 75000,
        "accountId": from,
        "toAccountId": to,
        "idempotencyKey": "order-42",
    });
    let path = "/api/v1/transaction/transfer";
    let (status, first) = post(&client, &srv, &alice, path, request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["type"], "TRANSFER_OUT");
    assert_eq!(first["data"]["finalBalance"], 125000);
    assert_eq!(first["data"]["toAccountId"], to);
    assert_eq!(first["data"]["debit"]["kind"], "TRANSFER_OUT");
    assert_eq!(first["data"]["credit"]["kind"], "TRANSFER_IN");

    let (status, second) = post(&client, &srv, &alice, path, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"], first["data"]);

    let (status, body) = post(
        &client,
        &srv,
        &alice,
        path,
        json!({
            "amount": 80000,
            "accountId": from,
            "toAccountId": to,
            "idempotencyKey": "order-42",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["data"]["error"], "idempotency_conflict");

    let res = client
        .get(srv.url(&format!("/api/v1/accounts/{to}/balance")))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["balance"], 75000);
}
