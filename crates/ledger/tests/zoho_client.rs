use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use ledger::{LedgerAccount, LedgerError, LedgerExpense, ZohoBooks, ZohoConfig};
use serde_json::{Value, json};

#[derive(Clone, Copy, Debug)]
enum ExpenseReply {
    Created,
    Unauthorized,
    Unavailable,
    ApiError,
    Slow,
}

#[derive(Clone)]
struct Stub {
    token_calls: Arc<AtomicUsize>,
    expense_calls: Arc<AtomicUsize>,
    token_ok: Arc<Mutex<bool>>,
    reply: Arc<Mutex<ExpenseReply>>,
    last_body: Arc<Mutex<Option<Value>>>,
}

impl Stub {
    fn new(reply: ExpenseReply) -> Self {
        Self {
            token_calls: Arc::new(AtomicUsize::new(0)),
            expense_calls: Arc::new(AtomicUsize::new(0)),
            token_ok: Arc::new(Mutex::new(true)),
            reply: Arc::new(Mutex::new(reply)),
            last_body: Arc::new(Mutex::new(None)),
        }
    }

    fn set_reply(&self, reply: ExpenseReply) {
        *self.reply.lock().unwrap() = reply;
    }
}

async fn token(State(stub): State<Stub>) -> Json<Value> {
    let n = stub.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if *stub.token_ok.lock().unwrap() {
        Json(json!({ "access_token": format!("tok-{n}"), "expires_in": 3600 }))
    } else {
        Json(json!({ "error": "invalid_code" }))
    }
}

async fn create_expense(
    State(stub): State<Stub>,
    Query(query): Query<std::collections::HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let n = stub.expense_calls.fetch_add(1, Ordering::SeqCst) + 1;
    assert_eq!(query.get("organization_id").map(String::as_str), Some("100001"));
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(auth.starts_with("Zoho-oauthtoken tok-"), "auth header: {auth}");
    *stub.last_body.lock().unwrap() = Some(body);

    let reply = *stub.reply.lock().unwrap();
    match reply {
        ExpenseReply::Created => Json(json!({
            "code": 0,
            "message": "The expense has been recorded.",
            "expense": { "expense_id": format!("zb-{}", 1000 + n) }
        }))
        .into_response(),
        ExpenseReply::Unauthorized => {
            (StatusCode::UNAUTHORIZED, "invalid oauth token").into_response()
        }
        ExpenseReply::Unavailable => {
            (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response()
        }
        ExpenseReply::ApiError => Json(json!({
            "code": 1002,
            "message": "Account does not exist."
        }))
        .into_response(),
        ExpenseReply::Slow => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::OK.into_response()
        }
    }
}

async fn organizations() -> Json<Value> {
    Json(json!({ "code": 0, "organizations": [] }))
}

async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/oauth/v2/token", post(token))
        .route("/books/v3/expenses", post(create_expense))
        .route("/books/v3/organizations", get(organizations))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(base: &str) -> ZohoConfig {
    ZohoConfig {
        entity: "haute".to_string(),
        organization_id: "100001".to_string(),
        organization_name: "Haute Brands".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "refresh".to_string(),
        api_base_url: format!("{base}/books/v3"),
        accounts_base_url: format!("{base}/oauth/v2"),
        expense_account: "Travel Expenses".to_string(),
        paid_through_account: "Petty Cash".to_string(),
    }
}

fn expense() -> LedgerExpense {
    LedgerExpense {
        expense_id: "0b7c".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(),
        amount_minor: 4250,
        category: "Flights".to_string(),
        merchant: "Delta Airlines".to_string(),
        description: Some("LAS -> JFK".to_string()),
        submitted_by: "alice".to_string(),
        event_id: Some("CES".to_string()),
        reimbursement_required: false,
        idempotency_key: "0b7c-1".to_string(),
    }
}

#[tokio::test]
async fn creates_expense_and_caches_token() {
    let stub = Stub::new(ExpenseReply::Created);
    let base = spawn_stub(stub.clone()).await;
    let books = ZohoBooks::new(config(&base), Duration::from_secs(5)).unwrap();

    let first = books.create_expense(&expense()).await.unwrap();
    let second = books.create_expense(&expense()).await.unwrap();

    assert_eq!(first.external_id, "zb-1001");
    assert_eq!(second.external_id, "zb-1002");
    assert!(!first.mock);
    assert_eq!(stub.token_calls.load(Ordering::SeqCst), 1);

    let body = stub.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["expense_date"], "2025-01-08");
    assert_eq!(body["amount"], json!(42.5));
    assert_eq!(body["vendor_name"], "Delta Airlines");
    assert_eq!(body["reference_number"], "CES - Delta Airlines");
    assert_eq!(body["account_name"], "Travel Expenses");
}

#[tokio::test]
async fn unauthorized_is_auth_error_and_drops_token() {
    let stub = Stub::new(ExpenseReply::Unauthorized);
    let base = spawn_stub(stub.clone()).await;
    let books = ZohoBooks::new(config(&base), Duration::from_secs(5)).unwrap();

    let err = books.create_expense(&expense()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Auth(_)), "{err:?}");

    stub.set_reply(ExpenseReply::Created);
    books.create_expense(&expense()).await.unwrap();
    assert_eq!(stub.token_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_refresh_token_is_auth_error() {
    let stub = Stub::new(ExpenseReply::Created);
    *stub.token_ok.lock().unwrap() = false;
    let base = spawn_stub(stub.clone()).await;
    let books = ZohoBooks::new(config(&base), Duration::from_secs(5)).unwrap();

    let err = books.create_expense(&expense()).await.unwrap_err();
    assert_eq!(err, LedgerError::Auth("invalid_code".to_string()));
    assert_eq!(stub.expense_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn service_unavailable_is_transient() {
    let stub = Stub::new(ExpenseReply::Unavailable);
    let base = spawn_stub(stub).await;
    let books = ZohoBooks::new(config(&base), Duration::from_secs(5)).unwrap();

    let err = books.create_expense(&expense()).await.unwrap_err();
    assert!(err.is_retryable(), "{err:?}");
}

#[tokio::test]
async fn api_error_code_is_misconfiguration() {
    let stub = Stub::new(ExpenseReply::ApiError);
    let base = spawn_stub(stub).await;
    let books = ZohoBooks::new(config(&base), Duration::from_secs(5)).unwrap();

    let err = books.create_expense(&expense()).await.unwrap_err();
    match err {
        LedgerError::Misconfigured(msg) => assert!(msg.contains("Account does not exist")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_ledger_times_out_as_transient() {
    let stub = Stub::new(ExpenseReply::Slow);
    let base = spawn_stub(stub).await;
    let books = ZohoBooks::new(config(&base), Duration::from_millis(300)).unwrap();

    let err = books.create_expense(&expense()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Transient(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_ledger_is_transient() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let books = ZohoBooks::new(config(&format!("http://{addr}")), Duration::from_secs(2)).unwrap();

    let err = books.create_expense(&expense()).await.unwrap_err();
    assert!(err.is_retryable(), "{err:?}");
}

#[tokio::test]
async fn health_reports_connected_organization() {
    let stub = Stub::new(ExpenseReply::Created);
    let base = spawn_stub(stub).await;
    let books = ZohoBooks::new(config(&base), Duration::from_secs(5)).unwrap();

    let health = books.health().await;
    assert!(health.healthy, "{}", health.message);
    assert!(!health.mock);
    assert!(health.message.contains("Haute Brands"));
}
