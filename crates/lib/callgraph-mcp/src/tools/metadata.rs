use rmcp::{
    ErrorData,
    model::CallToolResult,
    tool,
    tool_router,
};

use crate::{CallGraphMcp, helpers};

#[tool_router(router = tool_router_metadata, vis = "pub")]
impl CallGraphMcp {
    #[tool(description = "Get statistics about the loaded call graph and its input files.")]
    async fn get_call_graph_stats(&self) -> Result<CallToolResult, ErrorData> {
        let response = self.control.get_stats().await;
        helpers::respond(&response, response.success)
    }

    #[tool(description = "List graph ids in the snapshot with per-graph node and edge counts.")]
    async fn list_graphs(&self) -> Result<CallToolResult, ErrorData> {
        let response = self.control.list_graphs().await;
        helpers::respond(&response, response.success)
    }
}
