use clap::{Parser, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "aggs-upstreamd", version, about = "Reference aggregate-bar upstream.")]
struct CliArgs {
    /// Listen address; takes precedence over `--host`/`--port`.
    #[arg(long, env = "AGGS_UPSTREAM_ADDR")]
    addr: Option<SocketAddr>,

    #[arg(long, env = "POLY_MCP_HOST")]
    host: Option<String>,

    #[arg(long, env = "POLY_MCP_PORT")]
    port: Option<u16>,

    /// JSON file mapping tickers to bar records.
    #[arg(long, env = "AGGS_UPSTREAM_FIXTURE")]
    fixture: Option<PathBuf>,

    #[arg(
        long,
        env = "AGGS_UPSTREAM_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    request_timeout_secs: u64,

    #[arg(
        long,
        env = "AGGS_LOG_JSON",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    log_json: bool,
}

#[derive(Debug, Clone)]
pub struct UpstreamdConfig {
    pub addr: SocketAddr,
    pub fixture: Option<PathBuf>,
    pub request_timeout: Duration,
    pub log_json: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl UpstreamdConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for UpstreamdConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let addr = match args.addr {
            Some(addr) => addr,
            None => resolve(
                args.host.as_deref().unwrap_or(DEFAULT_HOST),
                args.port.unwrap_or(DEFAULT_PORT),
            )?,
        };
        if args.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "AGGS_UPSTREAM_REQUEST_TIMEOUT_SECS",
                value: args.request_timeout_secs.to_string(),
            });
        }

        Ok(Self {
            addr,
            fixture: args.fixture.filter(|path| !path.as_os_str().is_empty()),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            log_json: args.log_json,
        })
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let invalid = || ConfigError::InvalidSetting {
        name: "POLY_MCP_HOST",
        value: host.to_string(),
    };
    (host.trim(), port)
        .to_socket_addrs()
        .map_err(|_| invalid())?
        .next()
        .ok_or_else(invalid)
}
