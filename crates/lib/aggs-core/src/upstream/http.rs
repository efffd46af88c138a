use std::time::Duration;
use std::{error::Error, fmt};

use aggs_models::AggregateQuery;
use aggs_models::schema::UPSTREAM_LIST_AGGS_PATH;
use reqwest::{Client, Url};
use tracing::debug;

use super::{AggregateFetcher, TransportError, TransportErrorKind, UpstreamResponse, query_params};

pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:3000";
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable upstream settings fixed at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self::new(DEFAULT_UPSTREAM_URL)
    }
}

#[derive(Debug)]
pub enum UpstreamConfigError {
    InvalidBaseUrl(String),
    ZeroTimeout,
    Client(reqwest::Error),
}

impl fmt::Display for UpstreamConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBaseUrl(value) => write!(f, "invalid upstream base url: {value}"),
            Self::ZeroTimeout => f.write_str("upstream timeout must be greater than zero"),
            Self::Client(err) => write!(f, "failed to build upstream http client: {err}"),
        }
    }
}

impl Error for UpstreamConfigError {}

impl From<reqwest::Error> for UpstreamConfigError {
    fn from(err: reqwest::Error) -> Self {
        Self::Client(err)
    }
}

/// reqwest-backed upstream client.
///
/// The inner `Client` pools connections; a dropped `fetch` future releases its
/// connection. Proxy environment variables are ignored since the upstream is a
/// sibling service.
#[derive(Debug, Clone)]
pub struct HttpUpstreamClient {
    client: Client,
    base_url: String,
    endpoint: String,
}

impl HttpUpstreamClient {
    /// Builds a client for `config`.
    ///
    /// # Errors
    /// Returns `UpstreamConfigError` if the base URL is not an http(s) URL, the
    /// timeout is zero, or the TLS backend cannot be initialized.
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamConfigError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url)
            .map_err(|_| UpstreamConfigError::InvalidBaseUrl(config.base_url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(UpstreamConfigError::InvalidBaseUrl(config.base_url));
        }
        if config.timeout.is_zero() {
            return Err(UpstreamConfigError::ZeroTimeout);
        }

        let client = Client::builder()
            .user_agent(concat!("aggs-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .no_proxy()
            .build()?;
        let endpoint = format!("{base_url}{UPSTREAM_LIST_AGGS_PATH}");

        Ok(Self {
            client,
            base_url,
            endpoint,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AggregateFetcher for HttpUpstreamClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, query: &AggregateQuery) -> Result<UpstreamResponse, TransportError> {
        let params = query_params(query);
        debug!(endpoint = %self.endpoint, ticker = %query.ticker, "requesting upstream aggregates");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::new(TransportErrorKind::Body, err.to_string()))?;

        debug!(status, bytes = body.len(), "upstream responded");
        Ok(UpstreamResponse::new(status, body.to_vec()))
    }
}

fn map_send_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Request
    };
    TransportError::new(kind, err.to_string())
}
