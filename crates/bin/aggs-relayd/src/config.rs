use clap::{Parser, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use aggs_core::upstream::UpstreamConfig;
use aggs_core::upstream::http::DEFAULT_UPSTREAM_URL;
use aggs_models::QueryDefaults;
use aggs_models::schema::{DEFAULT_DISPLAY_LIMIT, DEFAULT_FETCH_LIMIT};

const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";

#[derive(Parser, Debug)]
#[command(name = "aggs-relayd", version, about = "MCP relay for OHLCV aggregate bars.")]
struct CliArgs {
    #[arg(long, env = "AGGS_UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    upstream_url: String,

    #[arg(
        long,
        env = "AGGS_UPSTREAM_TIMEOUT_SECS",
        default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS
    )]
    upstream_timeout_secs: u64,

    #[arg(long, env = "AGGS_DEFAULT_MAX_RESULTS", default_value_t = DEFAULT_DISPLAY_LIMIT)]
    default_max_results: usize,

    #[arg(long, env = "AGGS_DEFAULT_FETCH_LIMIT", default_value_t = DEFAULT_FETCH_LIMIT)]
    default_fetch_limit: usize,

    #[arg(
        long = "stdio",
        env = "AGGS_ENABLE_STDIO",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "AGGS_MCP_SERVE",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "AGGS_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "AGGS_LOG_JSON",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    log_json: bool,
}

/// Relay configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub upstream: UpstreamConfig,
    pub defaults: QueryDefaults,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub log_json: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSetting { name: &'static str, value: String },
    NoTransport,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
            Self::NoTransport => {
                f.write_str("no transport enabled: set AGGS_ENABLE_STDIO or AGGS_MCP_SERVE")
            }
        }
    }
}

impl Error for ConfigError {}

impl RelayConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for RelayConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let upstream_url = args.upstream_url.trim().to_string();
        if !(upstream_url.starts_with("http://") || upstream_url.starts_with("https://")) {
            return Err(ConfigError::InvalidSetting {
                name: "AGGS_UPSTREAM_URL",
                value: args.upstream_url,
            });
        }
        if args.upstream_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "AGGS_UPSTREAM_TIMEOUT_SECS",
                value: args.upstream_timeout_secs.to_string(),
            });
        }
        if args.default_max_results == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "AGGS_DEFAULT_MAX_RESULTS",
                value: args.default_max_results.to_string(),
            });
        }
        if args.default_fetch_limit == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "AGGS_DEFAULT_FETCH_LIMIT",
                value: args.default_fetch_limit.to_string(),
            });
        }
        if !args.enable_stdio && !args.mcp_serve {
            return Err(ConfigError::NoTransport);
        }

        Ok(Self {
            upstream: UpstreamConfig::new(upstream_url)
                .with_timeout(Duration::from_secs(args.upstream_timeout_secs)),
            defaults: QueryDefaults::default()
                .with_display_limit(args.default_max_results)
                .with_fetch_limit(args.default_fetch_limit),
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
            log_json: args.log_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            default_max_results: DEFAULT_DISPLAY_LIMIT,
            default_fetch_limit: DEFAULT_FETCH_LIMIT,
            enable_stdio: true,
            mcp_serve: false,
            mcp_http_addr: DEFAULT_MCP_HTTP_ADDR.parse().expect("valid MCP addr"),
            log_json: false,
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = RelayConfig::try_from(base_args()).expect("config should parse");

        assert_eq!(config.upstream.base_url, "http://localhost:3000");
        assert_eq!(config.upstream.timeout, Duration::from_secs(30));
        assert_eq!(config.defaults.display_limit, 100);
        assert_eq!(config.defaults.fetch_limit, 50_000);
        assert!(config.enable_stdio);
        assert!(!config.mcp_serve);
    }

    #[test]
    fn overrides_flow_into_query_defaults() {
        let mut args = base_args();
        args.upstream_url = " https://bars.example.com/ ".to_string();
        args.default_max_results = 10;
        args.default_fetch_limit = 500;

        let config = RelayConfig::try_from(args).expect("config should parse");

        assert_eq!(config.upstream.base_url, "https://bars.example.com/");
        assert_eq!(config.defaults.display_limit, 10);
        assert_eq!(config.defaults.fetch_limit, 500);
    }

    #[test]
    fn rejects_non_http_upstream() {
        let mut args = base_args();
        args.upstream_url = "localhost:3000".to_string();

        let err = RelayConfig::try_from(args).expect_err("scheme is required");

        assert_eq!(err.to_string(), "invalid AGGS_UPSTREAM_URL value: localhost:3000");
    }

    #[test]
    fn rejects_zero_timeout_and_limits() {
        let mut args = base_args();
        args.upstream_timeout_secs = 0;
        assert!(RelayConfig::try_from(args).is_err());

        let mut args = base_args();
        args.default_max_results = 0;
        assert!(RelayConfig::try_from(args).is_err());

        let mut args = base_args();
        args.default_fetch_limit = 0;
        assert!(RelayConfig::try_from(args).is_err());
    }

    #[test]
    fn requires_a_transport() {
        let mut args = base_args();
        args.enable_stdio = false;

        let err = RelayConfig::try_from(args).expect_err("no transport left");

        assert!(matches!(err, ConfigError::NoTransport));
    }
}
