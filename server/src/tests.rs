use super::*;
use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
};
use oro_store::{Memory, Operation};
use oro_types::{codec, BankBalances, Cell, PlayerId, Withdrawal, WithdrawalStatus};
use serde_json::{json, Value};
use std::num::{NonZeroU32, NonZeroU64};
use tower::ServiceExt;

const DATE: &str = "2025-03-01T12:00:00.000Z";

fn rate_limit(burst: u32) -> RateLimit {
    RateLimit {
        period_ms: NonZeroU64::new(60_000).unwrap(),
        burst: NonZeroU32::new(burst).unwrap(),
    }
}

fn api(store: Memory) -> (Arc<Reconciler<Memory>>, Router) {
    let reconciler = Arc::new(Reconciler::new(store));
    let router = Api::new(reconciler.clone(), rate_limit(100)).router();
    (reconciler, router)
}

fn request(method: Method, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        // The rate limiter keys on the client address.
        .header("x-forwarded-for", "127.0.0.1")
        .body(body)
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get_load(router: &Router) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request(Method::GET, "/load", Body::empty()))
        .await
        .unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

async fn post_sync(router: &Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request(Method::POST, "/sync", body.into()))
        .await
        .unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

fn sync_body(bank: Value, withdrawals: Value) -> String {
    json!({"action": "sync", "withdrawals": withdrawals, "oroBanco": bank}).to_string()
}

#[tokio::test]
async fn test_load_empty_sheet() {
    let (_, router) = api(Memory::new());
    let (status, body) = get_load(&router).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": []}));
}

#[tokio::test]
async fn test_sync_then_load() {
    let (reconciler, router) = api(Memory::new());

    let body = sync_body(
        json!({"alan": 80}),
        json!([{
            "id": "1", "nombre": "Alan", "oro": 20, "tasa": 0.5,
            "usd": 10.0, "fecha": DATE, "estado": "pendiente"
        }]),
    );
    let (status, response) = post_sync(&router, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);

    let rows = reconciler.store().rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], Cell::text(codec::SENTINEL));
    assert_eq!(rows[2][3], Cell::text("0.5"));

    let (status, body) = get_load(&router).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["oroBanco"]["alan"], 80);
    assert_eq!(body["oroBanco"]["tommy"], 0);
    assert_eq!(
        body["data"],
        json!([{
            "fecha": DATE, "nombre": "Alan", "oro": 20, "tasa": 0.5,
            "usd": 10.0, "estado": "pendiente"
        }])
    );
}

#[tokio::test]
async fn test_sync_replaces_contents() {
    let (reconciler, router) = api(Memory::new());
    let mut bank = BankBalances::default();
    bank.set(PlayerId::Tommy, 9);
    let mut paid = Withdrawal::new(PlayerId::Tommy, 3, 1.0, DATE);
    paid.status = WithdrawalStatus::Paid;

    for withdrawals in [vec![paid.clone(), paid.clone()], vec![paid]] {
        let body = serde_json::to_string(&SyncRequest::new(bank.clone(), withdrawals)).unwrap();
        let (status, _) = post_sync(&router, body).await;
        assert_eq!(status, StatusCode::OK);
    }
    // Sentinel, header and the single remaining withdrawal.
    assert_eq!(reconciler.store().rows().len(), 3);

    let (_, body) = get_load(&router).await;
    assert_eq!(body["data"][0]["estado"], "pagado");
}

#[tokio::test]
async fn test_load_legacy_sheet_omits_bank() {
    let legacy = vec![
        codec::HEADER.iter().map(|h| Cell::text(*h)).collect(),
        vec![
            Cell::text(DATE),
            Cell::text("Criss"),
            Cell::Number(4.0),
            Cell::Number(0.25),
            Cell::Number(1.0),
            Cell::text("pendiente"),
        ],
    ];
    let (_, router) = api(Memory::with_rows(legacy));
    let (status, body) = get_load(&router).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("oroBanco").is_none());
    assert_eq!(body["data"][0]["nombre"], "Criss");
}

#[tokio::test]
async fn test_sync_rejects_bad_requests() {
    let (reconciler, router) = api(Memory::with_rows(vec![vec![Cell::text("kept")]]));

    for body in [
        "not json".to_string(),
        json!({"action": "load", "withdrawals": [], "oroBanco": {}}).to_string(),
        json!({"action": "sync", "withdrawals": []}).to_string(),
    ] {
        let (status, response) = post_sync(&router, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], false);
        assert!(response["message"].is_string());
    }
    assert_eq!(reconciler.store().rows(), vec![vec![Cell::text("kept")]]);
}

#[tokio::test]
async fn test_sync_rejects_ledger_beyond_range() {
    let (reconciler, router) = api(Memory::with_rows(vec![vec![Cell::text("kept")]]));
    let withdrawals: Vec<Withdrawal> = (0..oro_store::MAX_ROWS - 1)
        .map(|i| Withdrawal::new(PlayerId::Alan, 1, 1.0, format!("{DATE}-{i}")))
        .collect();
    let body =
        serde_json::to_string(&SyncRequest::new(BankBalances::default(), withdrawals)).unwrap();

    let (status, response) = post_sync(&router, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], false);
    assert_eq!(reconciler.store().rows(), vec![vec![Cell::text("kept")]]);
}

#[tokio::test]
async fn test_blank_dates_sync_back() {
    let sheet = vec![
        codec::HEADER.iter().map(|h| Cell::text(*h)).collect(),
        vec![
            Cell::text(""),
            Cell::text("Criss"),
            Cell::Number(4.0),
            Cell::Number(0.25),
            Cell::Number(1.0),
            Cell::text("pagado"),
        ],
    ];
    let (reconciler, router) = api(Memory::with_rows(sheet));
    let (_, loaded) = get_load(&router).await;
    assert!(loaded["data"][0]["fecha"].is_null());

    let body = sync_body(json!({"criss": 2}), loaded["data"].clone());
    let (status, response) = post_sync(&router, body).await;
    assert_eq!(status, StatusCode::OK, "{response}");

    let contents = reconciler.pull().await.unwrap();
    assert_eq!(contents.withdrawals.len(), 1);
    assert_eq!(contents.withdrawals[0].date, None);
    assert_eq!(contents.withdrawals[0].status.as_deref(), Some("pagado"));
}

#[tokio::test]
async fn test_store_failures_are_500() {
    let (reconciler, router) = api(Memory::new());

    reconciler.store().fail(Operation::Read);
    let (status, body) = get_load(&router).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());

    reconciler.store().fail(Operation::Append);
    let (status, body) = post_sync(&router, sync_body(json!({}), json!([]))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_rate_limit() {
    let reconciler = Arc::new(Reconciler::new(Memory::new()));
    let router = Api::new(reconciler, rate_limit(2)).router();

    for _ in 0..2 {
        let (status, _) = get_load(&router).await;
        assert_eq!(status, StatusCode::OK);
    }
    let response = router
        .clone()
        .oneshot(request(Method::GET, "/load", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (_, router) = api(Memory::new());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/sync")
        .header(header::ORIGIN, "https://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header("x-forwarded-for", "127.0.0.1")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
