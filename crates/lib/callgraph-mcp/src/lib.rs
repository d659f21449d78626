//! MCP server implementation for callgraph-mcp.
//!
//! This crate wires the call-graph control plane into rmcp tool handlers. The
//! handlers only forward arguments and serialize the structured responses;
//! all query semantics live in `callgraph-core`.

mod helpers;
mod tools;
pub mod server;

use callgraph_core::control::{CallGraphControlPlane, SnapshotSource};
use callgraph_core::services::IndexLoader;
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};

const SERVER_INSTRUCTIONS: &str = r"callgraph-mcp answers questions about function relationships in a call-graph snapshot.

Workflow:
1. The server reads one snapshot directory at start-up (or on the first query): a relational dump
   (`methods.csv` + `calls.csv`), DOT exports (`*.dot`), or a tree of Python sources.
2. Look functions up by short name (the part after the last `:` and `.`), e.g. `parse` for
   `app/loader.py:Loader.parse`. A short name may match several definitions; lookups merge them.
3. Query relationships:
   - `get_callers` / `get_callees` list full names of callers or callees. Pass `graph` to restrict
     DOT snapshots to one graph id.
   - `get_function_details` returns id, full name, signature, and file of the first match.
   - `search_functions` does a case-insensitive substring search over short names.
   - `get_call_chain` walks callees depth-first up to `max_depth` (default 3).
4. Inspect the snapshot with `get_call_graph_stats` and `list_graphs`.

Notes:
- Every tool returns JSON with `success` and, on failure, `error`.
- A snapshot that fails to load stays failed until the server restarts.
- Use `help` and `formats_help` for details. `health` returns `ok`.";

/// MCP server wrapper around the call-graph control plane and tool routers.
#[derive(Clone)]
pub struct CallGraphMcp {
    tool_router: ToolRouter<Self>,
    control: CallGraphControlPlane,
}

impl CallGraphMcp {
    /// Creates a new server over an existing control plane.
    #[must_use]
    pub fn new(control: CallGraphControlPlane) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_data()
            + Self::tool_router_metadata()
            + Self::tool_router_context();
        Self {
            tool_router,
            control,
        }
    }

    /// Creates a new server sharing `loader` with every other clone.
    #[must_use]
    pub fn with_loader(loader: IndexLoader) -> Self {
        Self::new(CallGraphControlPlane::new(loader))
    }

    #[must_use]
    pub fn from_source(source: SnapshotSource) -> Self {
        Self::with_loader(IndexLoader::from_source(source))
    }

    #[must_use]
    pub const fn control(&self) -> &CallGraphControlPlane {
        &self.control
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl CallGraphMcp {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl ServerHandler for CallGraphMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
