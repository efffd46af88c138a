//! Upstream access for aggregate requests.
//!
//! `AggregateFetcher` is the seam between the dispatcher and the network; the
//! reqwest-backed implementation lives in [`http`].

use std::future::Future;
use std::{error::Error, fmt};

use aggs_models::AggregateQuery;
use aggs_models::schema::{
    PARAM_FROM,
    PARAM_LIMIT,
    PARAM_MAX_RESULTS,
    PARAM_MULTIPLIER,
    PARAM_TICKER,
    PARAM_TIMESPAN,
    PARAM_TO,
};

pub mod http;

pub use http::{HttpUpstreamClient, UpstreamConfig, UpstreamConfigError};

/// Raw upstream answer before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    #[must_use]
    pub const fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Body,
    Request,
}

/// The upstream could not be reached or stopped answering mid-response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TransportErrorKind::Timeout => write!(f, "request timeout: {}", self.message),
            TransportErrorKind::Connect => write!(f, "connection failed: {}", self.message),
            TransportErrorKind::Body => {
                write!(f, "failed to read response body: {}", self.message)
            }
            TransportErrorKind::Request => write!(f, "request failed: {}", self.message),
        }
    }
}

impl Error for TransportError {}

/// Performs exactly one upstream attempt per query.
pub trait AggregateFetcher: Send + Sync {
    /// Base URL used in caller-facing error messages.
    fn base_url(&self) -> &str;

    /// Issues the upstream request for `query`.
    fn fetch(
        &self,
        query: &AggregateQuery,
    ) -> impl Future<Output = Result<UpstreamResponse, TransportError>> + Send;
}

/// Upstream query string for `query`, in wire order.
#[must_use]
pub fn query_params(query: &AggregateQuery) -> Vec<(&'static str, String)> {
    vec![
        (PARAM_TICKER, query.ticker.clone()),
        (PARAM_MULTIPLIER, query.multiplier.to_string()),
        (PARAM_TIMESPAN, query.timespan.as_str().to_string()),
        (PARAM_FROM, query.from_date.clone()),
        (PARAM_TO, query.to_date.clone()),
        (PARAM_LIMIT, query.fetch_limit.to_string()),
        (PARAM_MAX_RESULTS, query.display_limit.to_string()),
    ]
}
