//! Daemon entry point for the reference aggregate upstream.

mod config;
mod logging;

use aggs_upstream::{FixtureSource, UpstreamServer, UpstreamServerConfig};
use tracing::{info, warn};

use crate::config::UpstreamdConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = UpstreamdConfig::from_args()?;
    logging::init(config.log_json);

    let source = match &config.fixture {
        Some(path) => {
            let source = FixtureSource::from_path(path)?;
            info!(fixture = %path.display(), tickers = ?source.tickers(), "fixture loaded");
            Some(source)
        }
        None => {
            warn!("no fixture configured; /v1/list_aggs will answer 503");
            None
        }
    };

    let server_config =
        UpstreamServerConfig::new(config.addr).with_request_timeout(config.request_timeout);
    UpstreamServer::new(source, server_config).serve().await
}
