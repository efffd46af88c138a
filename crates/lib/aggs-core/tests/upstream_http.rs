use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aggs_core::dispatch::RelayDispatcher;
use aggs_core::error::RelayErrorKind;
use aggs_core::upstream::{HttpUpstreamClient, UpstreamConfig};
use aggs_models::QueryDefaults;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde_json::{Map, Value, json};

type SeenQueries = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn list_aggs(
    State(seen): State<SeenQueries>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    seen.lock().expect("seen lock").push(params.clone());
    match params.get("ticker").map(String::as_str) {
        Some("AAPL") => {
            let records: Vec<Value> = (0..4)
                .map(|i: i64| {
                    json!({
                        "t": 1_704_067_200_000_i64 + i * 86_400_000,
                        "o": 185.0,
                        "h": 186.0,
                        "l": 184.0,
                        "c": 185.5,
                        "v": 50_000_000,
                        "vw": 185.2,
                        "n": 600_000,
                    })
                })
                .collect();
            (StatusCode::OK, Value::Array(records).to_string())
        }
        Some("SLOW") => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            (StatusCode::OK, "[]".to_string())
        }
        _ => (StatusCode::NOT_FOUND, "ticker not found".to_string()),
    }
}

async fn spawn_upstream() -> (SocketAddr, SeenQueries) {
    let seen = SeenQueries::default();
    let app = Router::new()
        .route("/v1/list_aggs", get(list_aggs))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test upstream");
    let addr = listener.local_addr().expect("listener should have an address");
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("test upstream should serve");
    });
    (addr, seen)
}

fn relay(base_url: &str, timeout: Duration) -> RelayDispatcher<HttpUpstreamClient> {
    let client = HttpUpstreamClient::new(UpstreamConfig::new(base_url).with_timeout(timeout))
        .expect("client should build");
    RelayDispatcher::new(client, QueryDefaults::default())
}

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[tokio::test]
async fn sends_snake_case_query_and_normalizes_response() {
    let (addr, seen) = spawn_upstream().await;
    let relay = relay(&format!("http://{addr}/"), Duration::from_secs(5));

    let result = relay
        .list_aggs(&args(json!({
            "ticker": "AAPL",
            "timespan": "hour",
            "multiplier": 4,
            "max_results": 3,
        })))
        .await
        .expect("list_aggs should succeed");

    assert_eq!(result.ticker, "AAPL");
    assert_eq!(result.resolved_timespan_label, "4 hour");
    assert_eq!(result.total_count, 4);
    assert_eq!(result.bars.len(), 3);
    assert_eq!(
        result.truncation_note.as_deref(),
        Some("Showing first 3 of 4 total aggregates")
    );
    assert_eq!(result.bars[0].transaction_count, Some(600_000));

    let seen = seen.lock().expect("seen lock").clone();
    assert_eq!(seen.len(), 1);
    let params = &seen[0];
    assert_eq!(params.get("ticker").map(String::as_str), Some("AAPL"));
    assert_eq!(params.get("multiplier").map(String::as_str), Some("4"));
    assert_eq!(params.get("timespan").map(String::as_str), Some("hour"));
    assert_eq!(params.get("from").map(String::as_str), Some("2024-01-01"));
    assert_eq!(params.get("to").map(String::as_str), Some("2024-12-31"));
    assert_eq!(params.get("limit").map(String::as_str), Some("50000"));
    assert_eq!(params.get("max_results").map(String::as_str), Some("3"));
}

#[tokio::test]
async fn not_found_is_classified_with_status() {
    let (addr, _seen) = spawn_upstream().await;
    let relay = relay(&format!("http://{addr}"), Duration::from_secs(5));

    let err = relay
        .list_aggs(&args(json!({ "ticker": "NOPE" })))
        .await
        .expect_err("unknown ticker should fail");

    assert_eq!(err.kind(), RelayErrorKind::UpstreamHttpError);
    assert_eq!(err.upstream_status(), Some(404));
    assert_eq!(err.message(), "HTTP Error 404: ticker not found");
}

#[tokio::test]
async fn slow_upstream_times_out_as_unreachable() {
    let (addr, _seen) = spawn_upstream().await;
    let base_url = format!("http://{addr}");
    let relay = relay(&base_url, Duration::from_millis(100));

    let err = relay
        .list_aggs(&args(json!({ "ticker": "SLOW" })))
        .await
        .expect_err("slow upstream should time out");

    assert_eq!(err.kind(), RelayErrorKind::UpstreamUnreachable);
    assert!(err.message().contains(&base_url));
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind throwaway listener");
    let addr = listener.local_addr().expect("listener should have an address");
    drop(listener);
    let base_url = format!("http://{addr}");
    let relay = relay(&base_url, Duration::from_secs(2));

    let reply = relay
        .dispatch("list_aggs", Some(&args(json!({ "ticker": "AAPL" }))))
        .await;

    assert!(reply.is_error());
    assert!(reply.text().contains(&base_url));
}
