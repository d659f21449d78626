//! Daemon entry point for the call-graph MCP server.
//!
//! Loads configuration from the command line and environment, sets up logging
//! on stderr, and serves the MCP protocol over stdio, streamable HTTP, or both.

mod config;

use callgraph_core::services::IndexLoader;
use callgraph_mcp::server::{serve_stdio, serve_streamable_http};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::CallGraphConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = CallGraphConfig::from_args()?;
    init_tracing(&config.log_filter);
    info!(
        out_dir = %config.out_dir.display(),
        format = config.format.as_str(),
        stdio = config.enable_stdio,
        http = config.mcp_serve,
        "starting callgraph-mcpd"
    );

    let loader = IndexLoader::from_source(config.snapshot_source());
    if config.eager_load
        && let Err(err) = loader.ensure_loaded().await
    {
        warn!(error = %err, "eager load failed; queries will report the failure");
    }

    let http_config = config.http_config();
    if !config.enable_stdio {
        return serve_streamable_http(loader, http_config).await;
    }

    if config.mcp_serve {
        let http_loader = loader.clone();
        tokio::spawn(async move {
            if let Err(err) = serve_streamable_http(http_loader, http_config).await {
                error!(error = %err, "streamable HTTP transport stopped");
            }
        });
    }
    serve_stdio(loader).await
}
