//! Reference market-data upstream for aggs-relay.
//!
//! Serves `GET /v1/list_aggs` over HTTP from an [`AggregateSource`], returning
//! the raw bar records as a JSON array. Display truncation is left to the
//! relay.

pub mod source;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aggs_models::schema::UPSTREAM_LIST_AGGS_PATH;
use aggs_models::{AggregateBar, Timespan, UnknownTimespan};
use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

pub use source::{AggregateSource, FixtureError, FixtureSource, SourceError, SourceRequest};

pub const SERVICE_NAME: &str = "aggs-upstream";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Configuration for the upstream HTTP server.
#[derive(Debug, Clone)]
pub struct UpstreamServerConfig {
    pub addr: SocketAddr,
    pub request_timeout: Duration,
}

impl UpstreamServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            request_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for UpstreamServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 3000)))
    }
}

/// HTTP upstream server wrapper.
///
/// A server built without a source still answers `/` and `/health`, but
/// `/v1/list_aggs` responds 503.
pub struct UpstreamServer<S> {
    config: UpstreamServerConfig,
    state: AppState<S>,
}

impl<S: AggregateSource + 'static> UpstreamServer<S> {
    #[must_use]
    pub fn new(source: Option<S>, config: UpstreamServerConfig) -> Self {
        let state = AppState {
            source: source.map(Arc::new),
            request_timeout: config.request_timeout,
        };
        Self { config, state }
    }

    /// Router serving this server's routes, for embedding or tests.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        self.serve_on(listener).await
    }

    /// Runs the HTTP server on an already bound listener.
    ///
    /// # Errors
    /// Returns any server error.
    pub async fn serve_on(
        self,
        listener: tokio::net::TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = build_router(self.state);
        info!("{SERVICE_NAME} listening on {}", listener.local_addr()?);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

struct AppState<S> {
    source: Option<Arc<S>>,
    request_timeout: Duration,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "Aggregate source not initialized. Start the server with a fixture."
                .to_string(),
        }
    }

    fn timeout() -> Self {
        Self {
            status: StatusCode::GATEWAY_TIMEOUT,
            message: "aggregate request timed out".to_string(),
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::UnknownTicker(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            },
            SourceError::Failed(message) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("Error fetching aggregates: {message}"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            detail: self.message,
        });
        (self.status, payload).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct ListAggsParams {
    ticker: String,
    #[serde(default = "default_multiplier")]
    multiplier: u32,
    #[serde(default = "default_timespan")]
    timespan: String,
    #[serde(default = "default_from", rename = "from")]
    from_date: String,
    #[serde(default = "default_to", rename = "to")]
    to_date: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

const fn default_multiplier() -> u32 {
    1
}

fn default_timespan() -> String {
    Timespan::Minute.as_str().to_string()
}

fn default_from() -> String {
    "2023-01-01".to_string()
}

fn default_to() -> String {
    "2023-06-13".to_string()
}

const fn default_limit() -> usize {
    50_000
}

const fn default_max_results() -> usize {
    100
}

impl ListAggsParams {
    fn into_request(self) -> Result<SourceRequest, ApiError> {
        let ticker = self.ticker.trim();
        if ticker.is_empty() {
            return Err(ApiError::bad_request("ticker is required"));
        }
        if self.multiplier == 0 {
            return Err(ApiError::bad_request("multiplier must be greater than zero"));
        }
        if self.limit == 0 {
            return Err(ApiError::bad_request("limit must be greater than zero"));
        }
        let timespan: Timespan = self
            .timespan
            .parse()
            .map_err(|err: UnknownTimespan| ApiError::bad_request(err.to_string()))?;
        let from = parse_date("from", &self.from_date)?;
        let to = parse_date("to", &self.to_date)?;

        Ok(SourceRequest {
            ticker: ticker.to_string(),
            multiplier: self.multiplier,
            timespan,
            from,
            to,
            limit: self.limit,
        })
    }
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ApiError::bad_request(format!("{name} must be a YYYY-MM-DD date, got {raw}")))
}

fn build_router<S: AggregateSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::<S>))
        .route(UPSTREAM_LIST_AGGS_PATH, get(list_aggs::<S>))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "list_aggs": UPSTREAM_LIST_AGGS_PATH,
            "health": "/health",
        },
    }))
}

async fn health<S: AggregateSource + 'static>(State(state): State<AppState<S>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "source_initialized": state.source.is_some(),
    }))
}

async fn list_aggs<S: AggregateSource + 'static>(
    State(state): State<AppState<S>>,
    params: Result<Query<ListAggsParams>, QueryRejection>,
) -> Result<Json<Vec<AggregateBar>>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let source = state.source.as_ref().ok_or_else(ApiError::unavailable)?;

    let max_results = params.max_results;
    let request = params.into_request()?;
    info!(
        ticker = %request.ticker,
        from = %request.from,
        to = %request.to,
        limit = request.limit,
        max_results,
        "fetching aggregates"
    );

    let bars = tokio::time::timeout(state.request_timeout, source.aggregates(&request))
        .await
        .map_err(|_| ApiError::timeout())?
        .map_err(|err| {
            warn!(ticker = %request.ticker, error = %err, "aggregate fetch failed");
            ApiError::from(err)
        })?;

    info!(ticker = %request.ticker, count = bars.len(), "fetched aggregates");
    Ok(Json(bars))
}
