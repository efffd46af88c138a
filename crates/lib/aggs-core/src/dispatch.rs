//! Tool dispatcher: the only entry point callers use.
//!
//! Each `dispatch` call is one Idle -> Processing -> Idle pass. The dispatcher
//! holds only immutable configuration, so concurrent calls never interact.

use aggs_models::schema::{ARG_TICKER, TOOL_LIST_AGGS};
use aggs_models::{AggregateResult, QueryDefaults};
use serde_json::{Map, Value};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::{RelayError, classify_response};
use crate::normalize::normalize;
use crate::query::build_query;
use crate::upstream::AggregateFetcher;

/// Caller-facing outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolReply {
    /// Pretty-printed `AggregateResult` JSON.
    Payload(String),
    /// Plain-text summary of a `RelayError`.
    Error(String),
}

impl ToolReply {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Payload(text) | Self::Error(text) => text,
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<Result<String, RelayError>> for ToolReply {
    fn from(outcome: Result<String, RelayError>) -> Self {
        match outcome {
            Ok(payload) => Self::Payload(payload),
            Err(err) => Self::Error(err.message().to_string()),
        }
    }
}

/// Sequences query building, the upstream call, and normalization.
#[derive(Debug, Clone)]
pub struct RelayDispatcher<F> {
    fetcher: F,
    defaults: QueryDefaults,
}

impl<F: AggregateFetcher> RelayDispatcher<F> {
    pub const fn new(fetcher: F, defaults: QueryDefaults) -> Self {
        Self { fetcher, defaults }
    }

    /// Names of the operations this dispatcher accepts.
    #[must_use]
    pub const fn operations() -> &'static [&'static str] {
        &[TOOL_LIST_AGGS]
    }

    #[must_use]
    pub const fn defaults(&self) -> &QueryDefaults {
        &self.defaults
    }

    #[must_use]
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Handles one tool call to completion; never fails past this boundary.
    pub async fn dispatch(
        &self,
        operation: &str,
        arguments: Option<&Map<String, Value>>,
    ) -> ToolReply {
        let request_id = Uuid::new_v4();
        let ticker = arguments
            .and_then(|arguments| arguments.get(ARG_TICKER))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let span = info_span!(
            "dispatch",
            %request_id,
            operation = %operation,
            ticker = %ticker
        );

        async move {
            info!("tool call received");
            let outcome = self.call(operation, arguments).await;
            match &outcome {
                Ok(payload) => debug!(bytes = payload.len(), "tool call succeeded"),
                Err(err) if err.kind().is_caller_error() => {
                    warn!(kind = %err.kind(), error = %err, "tool call rejected");
                }
                Err(err) => warn!(
                    kind = %err.kind(),
                    upstream_status = ?err.upstream_status(),
                    error = %err,
                    "tool call failed"
                ),
            }
            ToolReply::from(outcome)
        }
        .instrument(span)
        .await
    }

    /// Validates `operation` and returns the serialized payload.
    ///
    /// # Errors
    /// Returns `UnknownOperation` for any name other than `list_aggs`, plus any
    /// error from [`Self::list_aggs`].
    pub async fn call(
        &self,
        operation: &str,
        arguments: Option<&Map<String, Value>>,
    ) -> Result<String, RelayError> {
        if !Self::operations().iter().any(|known| *known == operation) {
            return Err(RelayError::unknown_operation(operation));
        }
        let empty = Map::new();
        let result = self.list_aggs(arguments.unwrap_or(&empty)).await?;
        Ok(serde_json::to_string_pretty(&result)?)
    }

    /// Runs the `list_aggs` pipeline.
    ///
    /// # Errors
    /// Returns `RelayError` classified by the failing stage.
    pub async fn list_aggs(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<AggregateResult, RelayError> {
        let query = build_query(arguments, &self.defaults)?;
        let outcome = self.fetcher.fetch(&query).await;
        let body = classify_response(self.fetcher.base_url(), outcome)?;
        let result = normalize(&query, &body)?;
        info!(
            total = result.total_count,
            returned = result.bars.len(),
            "aggregates normalized"
        );
        Ok(result)
    }
}
