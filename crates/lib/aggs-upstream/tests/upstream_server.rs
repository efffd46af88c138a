use aggs_models::AggregateBar;
use aggs_upstream::{
    AggregateSource,
    FixtureSource,
    SourceError,
    SourceRequest,
    UpstreamServer,
    UpstreamServerConfig,
};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/aggs_fixture.json");

fn fixture_router() -> Router {
    let source = FixtureSource::from_path(FIXTURE).expect("fixture should load");
    UpstreamServer::new(Some(source), UpstreamServerConfig::default()).router()
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let value = serde_json::from_slice(&body).expect("body should be JSON");
    (status, value)
}

struct BrokenSource;

impl AggregateSource for BrokenSource {
    async fn aggregates(&self, _request: &SourceRequest) -> Result<Vec<AggregateBar>, SourceError> {
        Err(SourceError::Failed("provider returned garbage".to_string()))
    }
}

#[tokio::test]
async fn root_describes_the_service() {
    let (status, body) = get_json(fixture_router(), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], json!("aggs-upstream"));
    assert_eq!(body["status"], json!("running"));
    assert_eq!(body["endpoints"]["list_aggs"], json!("/v1/list_aggs"));
    assert_eq!(body["endpoints"]["health"], json!("/health"));
}

#[tokio::test]
async fn health_reports_source_state() {
    let (status, body) = get_json(fixture_router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["source_initialized"], json!(true));
    let timestamp = body["timestamp"].as_str().expect("timestamp should be a string");
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());

    let bare = UpstreamServer::<FixtureSource>::new(None, UpstreamServerConfig::default());
    let (_, body) = get_json(bare.router(), "/health").await;
    assert_eq!(body["source_initialized"], json!(false));
}

#[tokio::test]
async fn list_aggs_returns_raw_records_within_range() {
    let (status, body) = get_json(
        fixture_router(),
        "/v1/list_aggs?ticker=aapl&timespan=day&from=2024-01-02&to=2024-01-05",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().expect("body should be an array");
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["timestamp"], json!(1_704_171_600_000_i64));
    assert_eq!(records[0]["open"], json!(185.64));
    assert_eq!(records[0]["volume"], json!(40_000_000));
    assert_eq!(records[0]["transactions"], json!(500_000));
}

#[tokio::test]
async fn list_aggs_caps_records_at_limit_but_ignores_max_results() {
    let (status, body) = get_json(
        fixture_router(),
        "/v1/list_aggs?ticker=AAPL&from=2024-01-01&to=2024-12-31&limit=6&max_results=2",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(6));
}

#[tokio::test]
async fn default_window_predates_fixture_data() {
    let (status, body) = get_json(fixture_router(), "/v1/list_aggs?ticker=AAPL").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn unknown_ticker_is_not_found() {
    let (status, body) = get_json(fixture_router(), "/v1/list_aggs?ticker=ZZZZ").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "ticker not found: ZZZZ" }));
}

#[tokio::test]
async fn bad_parameters_are_rejected() {
    for uri in [
        "/v1/list_aggs",
        "/v1/list_aggs?ticker=AAPL&timespan=fortnight",
        "/v1/list_aggs?ticker=AAPL&from=01/02/2024",
        "/v1/list_aggs?ticker=AAPL&multiplier=0",
        "/v1/list_aggs?ticker=AAPL&limit=0",
        "/v1/list_aggs?ticker=%20",
    ] {
        let (status, body) = get_json(fixture_router(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["detail"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn missing_source_is_unavailable() {
    let server = UpstreamServer::<FixtureSource>::new(None, UpstreamServerConfig::default());

    let (status, body) = get_json(server.router(), "/v1/list_aggs?ticker=AAPL").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(
        body["detail"]
            .as_str()
            .is_some_and(|detail| detail.contains("not initialized"))
    );
}

#[tokio::test]
async fn source_failure_is_an_internal_error() {
    let server = UpstreamServer::new(Some(BrokenSource), UpstreamServerConfig::default());

    let (status, body) = get_json(server.router(), "/v1/list_aggs?ticker=AAPL").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "detail": "Error fetching aggregates: provider returned garbage" })
    );
}
