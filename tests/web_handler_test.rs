#![cfg(feature = "web")]
//! HTTP API tests: bearer auth, status mapping and JSON bodies.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use tradeledger::adapters::memory_store::MemoryStore;
use tradeledger::adapters::token_auth::StaticTokenAuth;
use tradeledger::adapters::web::{build_router, AppState};
use tradeledger::domain::engine::Ledger;
use tradeledger::domain::forecast::LinearForecaster;
use tradeledger::domain::user::UserId;
use tradeledger::ports::market_port::MarketDataPort;

use common::*;

const ALICE: &str = "alice-token";
const BOB: &str = "bob-token";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    alice: UserId,
}

fn create_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(Ledger::new(store.clone(), universe()));
    let alice = funded_user(&ledger, "alice", dec!(1000.00));
    let bob = ledger.register("bob").unwrap().id;

    store
        .insert_bars(&generate_bars("AAPL", "2024-01-01", 30, 100.0, 1.0))
        .unwrap();

    let tokens = HashMap::from([(ALICE.to_string(), alice), (BOB.to_string(), bob)]);
    let state = AppState {
        ledger,
        market: store.clone(),
        auth: Arc::new(StaticTokenAuth::new(tokens)),
        forecaster: Arc::new(LinearForecaster),
        max_forecast_days: 10,
    };

    TestApp {
        router: build_router(state),
        store,
        alice,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_needs_no_token() {
    let app = create_test_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn missing_or_unknown_token_is_unauthorized() {
    let app = create_test_app();

    let request = Request::builder().uri("/users/me").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&app.router, get("/users/me", "stolen")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/users/me")
        .header(header::AUTHORIZATION, ALICE)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn buy_commits_and_updates_account() {
    let app = create_test_app();

    let (status, body) = send(
        &app.router,
        post_json(
            "/transactions",
            ALICE,
            json!({"transaction_type": "buy", "ticker": "aapl", "shares": 10, "price": "50.00", "trade_date": "2024-01-02"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["transaction_type"], "buy");
    assert_eq!(body["ticker"], "AAPL");
    assert_eq!(body["shares"], 10);
    assert_eq!(body["trade_date"], "2024-01-02");

    let (status, body) = send(&app.router, get("/users/me", ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["balance"], "500.00");
    assert_eq!(body["holdings"][0]["ticker"], "AAPL");
    assert_eq!(body["holdings"][0]["shares"], 10);
    assert_eq!(body["watchlist"], json!(["AAPL"]));
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert!(body["valuation"]["positions"][0]["price"].is_string());
    assert_eq!(body["valuation"]["cash"], "500.00");
}

#[tokio::test]
async fn rejections_map_to_client_errors() {
    let app = create_test_app();

    let (status, body) = send(
        &app.router,
        post_json("/transactions", ALICE, json!({"transaction_type": "withdraw", "price": "5000"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_funds");

    let (status, body) = send(
        &app.router,
        post_json(
            "/transactions",
            ALICE,
            json!({"transaction_type": "buy", "ticker": "ZZZZ", "shares": 1, "price": "1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown_ticker");

    let (status, body) = send(
        &app.router,
        post_json("/transactions", ALICE, json!({"transaction_type": "gift", "price": "1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    assert_eq!(balance(app.store.as_ref(), app.alice), dec!(1000.00));
}

#[tokio::test]
async fn users_only_see_their_own_account() {
    let app = create_test_app();
    let (status, body) = send(&app.router, get("/users/me/transactions", BOB)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (_, body) = send(&app.router, get("/users/me/transactions", ALICE)).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn transaction_range_is_validated() {
    let app = create_test_app();
    let (status, _) = send(
        &app.router,
        get("/users/me/transactions?from=2024-02-01&to=2024-01-01", ALICE),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        get("/users/me/transactions?from=2024-01-01&to=2024-01-01", ALICE),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn watchlist_add_list_remove() {
    let app = create_test_app();

    let (status, body) =
        send(&app.router, post_json("/watchlist", BOB, json!({"ticker": "msft"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ticker"], "MSFT");

    let (status, body) =
        send(&app.router, post_json("/watchlist", BOB, json!({"ticker": "MSFT"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_watchlist_entry");

    let (_, body) = send(&app.router, get("/watchlist", BOB)).await;
    assert_eq!(body, json!(["MSFT"]));

    let (status, _) = send(&app.router, delete("/watchlist/MSFT", BOB)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app.router, delete("/watchlist/MSFT", BOB)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stock_history_and_forecast() {
    let app = create_test_app();

    let (status, body) = send(
        &app.router,
        get("/stocks/aapl?from=2024-01-10&to=2024-01-12", ALICE),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bars = body.as_array().unwrap();
    assert_eq!(bars.len(), 3);
    assert_eq!(bars[0]["trade_date"], "2024-01-10");

    let (status, _) = send(&app.router, get("/stocks/MSFT", ALICE)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app.router, get("/stocks/AAPL/forecast?days=3", ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    let points = body.as_array().unwrap();
    assert_eq!(points.len(), 3);
    // Last stored bar is Tuesday 2024-01-30; forecasts start the next day.
    assert_eq!(points[0]["trade_date"], "2024-01-31");

    let (status, _) = send(&app.router, get("/stocks/AAPL/forecast?days=11", ALICE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app.router, get("/stocks/AAPL/forecast?days=0", ALICE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let app = create_test_app();
    let (status, body) = send(&app.router, get("/nope", ALICE)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
