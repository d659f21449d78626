use clap::{Parser, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use callgraph_core::control::SnapshotSource;
use callgraph_mcp::server::McpHttpServerConfig;
use callgraph_store::models::SnapshotFormat;

const DEFAULT_OUT_DIR: &str = "out";
const DEFAULT_FORMAT: &str = "auto";
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_SSE_KEEP_ALIVE_SECS: u64 = 15;

#[derive(Parser, Debug)]
#[command(name = "callgraph-mcpd", version, about = "Call-graph MCP daemon.")]
struct CliArgs {
    #[arg(long, env = "CALLGRAPH_OUT_DIR", default_value = DEFAULT_OUT_DIR)]
    out_dir: PathBuf,

    #[arg(long, env = "CALLGRAPH_FORMAT", default_value = DEFAULT_FORMAT)]
    format: String,

    #[arg(
        long = "stdio",
        env = "CALLGRAPH_ENABLE_STDIO",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "CALLGRAPH_MCP_SERVE",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "CALLGRAPH_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "CALLGRAPH_MCP_STATEFUL",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_stateful: bool,

    /// Seconds between SSE keep-alive pings; 0 disables them.
    #[arg(long, env = "CALLGRAPH_MCP_SSE_KEEP_ALIVE", default_value_t = DEFAULT_SSE_KEEP_ALIVE_SECS)]
    mcp_sse_keep_alive: u64,

    #[arg(
        long,
        env = "CALLGRAPH_EAGER_LOAD",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    eager_load: bool,

    #[arg(long, env = "CALLGRAPH_LOG", default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct CallGraphConfig {
    pub out_dir: PathBuf,
    pub format: SnapshotFormat,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub mcp_stateful: bool,
    pub mcp_sse_keep_alive: Option<Duration>,
    pub eager_load: bool,
    pub log_filter: String,
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
            Self::NoTransport => write!(
                f,
                "no transport enabled: set CALLGRAPH_ENABLE_STDIO or CALLGRAPH_MCP_SERVE"
            ),
        }
    }
}

impl Error for ConfigError {}

impl CallGraphConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }

    pub fn snapshot_source(&self) -> SnapshotSource {
        SnapshotSource::new(self.out_dir.clone()).with_format(self.format)
    }

    pub fn http_config(&self) -> McpHttpServerConfig {
        McpHttpServerConfig::new(self.mcp_http_addr)
            .with_stateful_mode(self.mcp_stateful)
            .with_sse_keep_alive(self.mcp_sse_keep_alive)
    }
}

fn parse_format(value: &str) -> Option<SnapshotFormat> {
    match value.trim().to_ascii_lowercase().as_str() {
        "auto" => Some(SnapshotFormat::Auto),
        "relational" | "csv" => Some(SnapshotFormat::Relational),
        "dot" => Some(SnapshotFormat::Dot),
        "python" | "py" => Some(SnapshotFormat::PythonSource),
        _ => None,
    }
}

impl TryFrom<CliArgs> for CallGraphConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let Some(format) = parse_format(&args.format) else {
            return Err(ConfigError::InvalidSetting {
                name: "CALLGRAPH_FORMAT",
                value: args.format,
            });
        };

        if args.out_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "CALLGRAPH_OUT_DIR",
                value: String::new(),
            });
        }

        if !args.enable_stdio && !args.mcp_serve {
            return Err(ConfigError::NoTransport);
        }

        let log_filter = if args.log_filter.trim().is_empty() {
            DEFAULT_LOG_FILTER.to_string()
        } else {
            args.log_filter
        };

        Ok(Self {
            out_dir: args.out_dir,
            format,
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
            mcp_stateful: args.mcp_stateful,
            mcp_sse_keep_alive: (args.mcp_sse_keep_alive > 0)
                .then_some(Duration::from_secs(args.mcp_sse_keep_alive)),
            eager_load: args.eager_load,
            log_filter,
        })
    }
}
