//! MCP server runners for callgraph-mcp.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use callgraph_core::services::IndexLoader;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::info;

use crate::CallGraphMcp;

pub const DEFAULT_HTTP_PORT: u16 = 4020;

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

    #[must_use]
    pub const fn with_stateful_mode(mut self, stateful_mode: bool) -> Self {
        self.stateful_mode = stateful_mode;
        self
    }

    /// Sets the SSE keep-alive interval; `None` disables keep-alive pings.
    #[must_use]
    pub const fn with_sse_keep_alive(mut self, keep_alive: Option<Duration>) -> Self {
        self.sse_keep_alive = keep_alive;
        self
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_HTTP_PORT)))
    }
}

/// Serves the MCP server over stdio.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio(
    loader: IndexLoader,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(root = %loader.source().root.display(), "serving MCP over stdio");
    let service = CallGraphMcp::with_loader(loader);
    let (stdin, stdout) = stdio();
    let running = serve_server(service, (stdin, stdout)).await?;
    let _ = running.waiting().await?;
    Ok(())
}

/// `/health` answers with the loader state: `unloaded`, `loaded` or `failed`.
async fn health(State(loader): State<IndexLoader>) -> &'static str {
    loader.state().as_str()
}

/// Builds the HTTP router: `/health` plus the MCP service under `/mcp`.
///
/// Every session gets its own server value; all of them share `loader`.
#[must_use]
pub fn router(loader: IndexLoader, config: &McpHttpServerConfig) -> Router {
    let session_loader = loader.clone();
    let service: StreamableHttpService<CallGraphMcp, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(CallGraphMcp::with_loader(session_loader.clone())),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: config.sse_keep_alive,
                sse_retry: config.sse_retry,
                stateful_mode: config.stateful_mode,
                ..Default::default()
            },
        );

    Router::new()
        .route("/health", get(health))
        .with_state(loader)
        .nest_service("/mcp", service)
}

/// Serves the MCP server using streamable HTTP transport.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http(
    loader: IndexLoader,
    config: McpHttpServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(loader, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(
        addr = %config.addr,
        stateful = config.stateful_mode,
        "serving MCP over streamable HTTP"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use callgraph_core::control::SnapshotSource;

    #[test]
    fn default_http_config_binds_localhost() {
        let config = McpHttpServerConfig::default();
        assert_eq!(config.addr.to_string(), "127.0.0.1:4020");
        assert!(config.stateful_mode);

        let config = config
            .with_stateful_mode(false)
            .with_sse_keep_alive(None);
        assert!(!config.stateful_mode);
        assert!(config.sse_keep_alive.is_none());
    }

    #[tokio::test]
    async fn health_reports_loader_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loader = IndexLoader::from_source(SnapshotSource::new(dir.path()));
        assert_eq!(health(State(loader.clone())).await, "unloaded");

        assert!(loader.ensure_loaded().await.is_err());
        assert_eq!(health(State(loader)).await, "failed");
    }
}
