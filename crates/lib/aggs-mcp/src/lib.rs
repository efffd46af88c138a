//! MCP server implementation for aggs-relay.
//!
//! This crate exposes the relay dispatcher as an rmcp `ServerHandler` and
//! provides the stdio and streamable HTTP runners.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use aggs_core::dispatch::RelayDispatcher;
use aggs_core::upstream::AggregateFetcher;
use rmcp::model::{
    CallToolRequestParams,
    CallToolResult,
    JsonObject,
    ListToolsResult,
    PaginatedRequestParams,
    ServerCapabilities,
    ServerInfo,
    Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler};
use tracing::debug;

pub use tools::list_aggs_tool;

const SERVER_INSTRUCTIONS: &str = r"aggs-relay fetches OHLCV aggregate bars for a stock ticker from the configured market-data upstream.

Tool:
- `list_aggs` with `ticker` (required), `multiplier`, `timespan` (minute, hour, day, week, month, quarter, year),
  `from_date` and `to_date` (YYYY-MM-DD), `max_results` (bars returned), and `limit` (bars fetched upstream).

Notes:
- Omitted or unreadable optional arguments fall back to their defaults.
- The result is pretty-printed JSON: `ticker`, `timespan`, `from_date`, `to_date`, `count`, `aggregates`, `note`.
- `count` is the number of bars the upstream returned; `note` is set when `aggregates` was cut to `max_results`.
- Failures come back as a single plain-text message.";

/// MCP server wrapper around the relay dispatcher.
pub struct AggsMcp<F> {
    dispatcher: Arc<RelayDispatcher<F>>,
}

impl<F> Clone for AggsMcp<F> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<F: AggregateFetcher> AggsMcp<F> {
    /// Creates a new server owning `dispatcher`.
    #[must_use]
    pub fn new(dispatcher: RelayDispatcher<F>) -> Self {
        Self::with_dispatcher(Arc::new(dispatcher))
    }

    /// Creates a new server using a shared dispatcher handle.
    #[must_use]
    pub const fn with_dispatcher(dispatcher: Arc<RelayDispatcher<F>>) -> Self {
        Self { dispatcher }
    }

    /// Tools advertised to MCP clients.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        vec![list_aggs_tool(self.dispatcher.defaults())]
    }

    /// Runs one tool call through the dispatcher.
    ///
    /// Relay failures become error-flagged text results rather than protocol
    /// errors.
    pub async fn handle_call(
        &self,
        name: &str,
        arguments: Option<&JsonObject>,
    ) -> CallToolResult {
        let reply = self.dispatcher.dispatch(name, arguments).await;
        helpers::tool_result(reply)
    }
}

impl<F> ServerHandler for AggsMcp<F>
where
    F: AggregateFetcher + 'static,
{
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(tool = %request.name, "call_tool");
        Ok(self
            .handle_call(&request.name, request.arguments.as_ref())
            .await)
    }
}
