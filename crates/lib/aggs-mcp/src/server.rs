//! MCP server runners for aggs-relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aggs_core::dispatch::RelayDispatcher;
use aggs_core::upstream::AggregateFetcher;
use axum::Router;
use axum::routing::get;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::info;

use crate::AggsMcp;

pub const DEFAULT_MCP_HTTP_ADDR: SocketAddr =
    SocketAddr::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, 4020));

/// Configuration for the MCP streamable HTTP server.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    pub stateful_mode: bool,
    pub sse_keep_alive: Option<Duration>,
    pub sse_retry: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
        }
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MCP_HTTP_ADDR)
    }
}

/// Serves the MCP server over stdio until the client disconnects.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio<F>(
    dispatcher: Arc<RelayDispatcher<F>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: AggregateFetcher + 'static,
{
    let service = AggsMcp::with_dispatcher(dispatcher);
    let (stdin, stdout) = stdio();
    info!("aggs-relay serving MCP over stdio");
    let running = serve_server(service, (stdin, stdout)).await?;
    let _ = running.waiting().await?;
    Ok(())
}

/// Builds the axum router hosting the MCP endpoint at `/mcp` and `/health`.
pub fn build_router<F>(dispatcher: Arc<RelayDispatcher<F>>, config: &McpHttpServerConfig) -> Router
where
    F: AggregateFetcher + 'static,
{
    let service: StreamableHttpService<AggsMcp<F>, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(AggsMcp::with_dispatcher(dispatcher.clone())),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: config.sse_keep_alive,
                sse_retry: config.sse_retry,
                stateful_mode: config.stateful_mode,
                ..Default::default()
            },
        );

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest_service("/mcp", service)
}

/// Serves the MCP server using streamable HTTP transport on `listener`.
///
/// Binding is left to the caller so address conflicts surface before any
/// task is spawned.
///
/// # Errors
/// Returns any server error.
pub async fn serve_streamable_http<F>(
    dispatcher: Arc<RelayDispatcher<F>>,
    config: &McpHttpServerConfig,
    listener: tokio::net::TcpListener,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: AggregateFetcher + 'static,
{
    let app = build_router(dispatcher, config);
    info!("aggs-relay serving MCP over HTTP on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
