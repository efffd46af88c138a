//! Daemon entry point for the aggs MCP relay.
//!
//! Loads configuration from CLI arguments and the environment, builds the
//! upstream client, and serves MCP over stdio and/or streamable HTTP.

mod config;
mod logging;

use std::net::SocketAddr;
use std::sync::Arc;

use aggs_core::dispatch::RelayDispatcher;
use aggs_core::upstream::HttpUpstreamClient;
use aggs_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::RelayConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = RelayConfig::from_args()?;
    logging::init(config.log_json);

    let client = HttpUpstreamClient::new(config.upstream.clone())?;
    info!(
        upstream = %client.endpoint(),
        timeout_secs = config.upstream.timeout.as_secs(),
        "aggs-relayd starting"
    );
    let dispatcher = Arc::new(RelayDispatcher::new(client, config.defaults.clone()));

    let http = if config.mcp_serve {
        Some(start_http(dispatcher.clone(), config.mcp_http_addr).await?)
    } else {
        None
    };

    match (config.enable_stdio, http) {
        (true, Some(mut http)) => {
            tokio::select! {
                served = serve_stdio(dispatcher) => {
                    http.abort();
                    served?;
                    info!("stdio client disconnected; shutting down");
                }
                joined = &mut http => {
                    let served = joined?;
                    if let Err(err) = &served {
                        error!(error = %err, "MCP HTTP transport stopped");
                    }
                    served?;
                }
            }
        }
        (true, None) => {
            serve_stdio(dispatcher).await?;
            info!("stdio client disconnected; shutting down");
        }
        (false, Some(http)) => http.await??,
        (false, None) => {}
    }
    Ok(())
}

/// Binds the HTTP listener in the caller's task so address errors propagate,
/// then serves on a background task.
async fn start_http(
    dispatcher: Arc<RelayDispatcher<HttpUpstreamClient>>,
    addr: SocketAddr,
) -> Result<JoinHandle<Result<(), BoxError>>, BoxError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let http_config = McpHttpServerConfig::new(addr);
    Ok(tokio::spawn(async move {
        serve_streamable_http(dispatcher, &http_config, listener).await
    }))
}
