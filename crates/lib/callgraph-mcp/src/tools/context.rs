use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::CallGraphMcp;

/// Payload listing the MCP commands this server exposes.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
}

impl Default for HelpCommands {
    fn default() -> Self {
        Self {
            commands: vec![
                "help - List MCP commands to get context with how this MCP server works."
                    .to_string(),
                "formats_help - Describes the snapshot formats the server can load."
                    .to_string(),
                "get_callers - Full names of functions calling a short name, optionally scoped to a graph."
                    .to_string(),
                "get_callees - Full names of functions called by a short name, optionally scoped to a graph."
                    .to_string(),
                "get_function_details - Id, full name, signature, and file of the first matching definition."
                    .to_string(),
                "search_functions - Case-insensitive substring search over short names."
                    .to_string(),
                "get_call_chain - Depth-first callee walk bounded by max_depth (default 3)."
                    .to_string(),
                "get_call_graph_stats - Record, edge, and name counts plus input file presence."
                    .to_string(),
                "list_graphs - Graph ids in the snapshot with per-graph counts."
                    .to_string(),
                "health - Returns ok."
                    .to_string(),
            ],
        }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl CallGraphMcp {
    #[tool(description = "List the MCP commands to get context with how this MCP server works.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }

    #[tool(description = "Describes the snapshot formats the server can load and how names are derived.")]
    async fn formats_help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text(
r#"
1.  The snapshot directory is set with `CALLGRAPH_OUT_DIR` (default `out`). The format is picked with
    `CALLGRAPH_FORMAT` (`auto`, `relational`, `dot`, `python`). `auto` prefers a relational dump and
    falls back to DOT exports.
2.  Relational dump: `methods.csv` and `calls.csv`, both with a header row.
        methods.csv: method_id, full_name, signature, file, line_number
        calls.csv:   caller_id, callee_id, callee_full_name, line_number
    A callee_id of `-1` marks a call whose target was not resolved; its callee_full_name is kept
    unless it is `<unknownFullName>`.
3.  DOT exports: every `*.dot` file in the directory. The graph id is the file name before the first
    `-` (e.g. `0-cfg.dot` is graph `0`). Both dialects are accepted:
        "ID" [label = <TYPE, LINE<BR/>CODE>]    "SRC" -> "DST"
        N [label="TEXT"];                       N -> M;
    Node names come from the code in the label (`def name`, then the first `name(` call), then the
    operation type. Numeric node ids are prefixed with the graph id.
4.  Python sources: every `*.py` file below the directory, hidden folders skipped. Functions are
    named `path/file.py:function` or `path/file.py:Class.method`; top-level code belongs to
    `path/file.py:<module>`. Calls bind to a same-named definition in the same file first.
5.  Queries always take the short name: the text after the last `:`, then after the last `.`.
"#
        )]))
    }
}
