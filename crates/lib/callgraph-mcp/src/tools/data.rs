use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::{CallGraphMcp, helpers};

/// Parameters for caller and callee lookups.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RelationParams {
    /// Short function name, e.g. `parse`.
    pub function: String,
    /// Restrict edges to one graph id (DOT snapshots).
    pub graph: Option<String>,
}

/// Parameters for fetching a function's details.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FunctionParams {
    pub function: String,
}

/// Parameters for searching function names.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchFunctionsParams {
    /// Case-insensitive substring; empty lists every name.
    pub query: String,
}

/// Parameters for a bounded call-chain walk.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CallChainParams {
    pub function: String,
    /// Maximum number of call levels below the start function. Defaults to 3.
    pub max_depth: Option<i64>,
}

#[tool_router(router = tool_router_data, vis = "pub")]
impl CallGraphMcp {
    #[tool(description = "List the full names of functions that call the given function.")]
    async fn get_callers(
        &self,
        Parameters(params): Parameters<RelationParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let response = self
            .control
            .get_callers(&params.function, params.graph.as_deref())
            .await;
        helpers::respond(&response, response.success)
    }

    #[tool(description = "List the full names of functions called by the given function.")]
    async fn get_callees(
        &self,
        Parameters(params): Parameters<RelationParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let response = self
            .control
            .get_callees(&params.function, params.graph.as_deref())
            .await;
        helpers::respond(&response, response.success)
    }

    #[tool(description = "Get id, full name, signature, and file for a function.")]
    async fn get_function_details(
        &self,
        Parameters(params): Parameters<FunctionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let response = self.control.get_function_details(&params.function).await;
        helpers::respond(&response, response.success)
    }

    #[tool(description = "Search function names by case-insensitive substring.")]
    async fn search_functions(
        &self,
        Parameters(params): Parameters<SearchFunctionsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let response = self.control.search_functions(&params.query).await;
        helpers::respond(&response, response.success)
    }

    #[tool(description = "Walk callees depth-first from a function, up to max_depth levels (default 3).")]
    async fn get_call_chain(
        &self,
        Parameters(params): Parameters<CallChainParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let response = self
            .control
            .get_call_chain(&params.function, params.max_depth)
            .await;
        helpers::respond(&response, response.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use callgraph_core::control::SnapshotSource;
    use serde_json::Value;

    fn server_with_snapshot() -> (tempfile::TempDir, CallGraphMcp) {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("methods.csv"),
            "method_id,full_name,signature,file,line_number\n\
             m1,a.py:foo,foo(),a.py,1\n\
             m2,b.py:bar,bar(x),b.py,4\n",
        )
        .expect("write methods");
        fs::write(
            dir.path().join("calls.csv"),
            "caller_id,callee_id,callee_full_name,line_number\nm1,m2,b.py:bar,2\n",
        )
        .expect("write calls");
        let server = CallGraphMcp::from_source(SnapshotSource::new(dir.path()));
        (dir, server)
    }

    fn payload(result: &CallToolResult) -> Value {
        let text = result
            .content
            .first()
            .and_then(|content| content.as_text())
            .map(|content| content.text.clone())
            .expect("text content");
        serde_json::from_str(&text).expect("json payload")
    }

    #[tokio::test]
    async fn callers_and_callees_round_trip() {
        let (_dir, server) = server_with_snapshot();

        let callees = server
            .get_callees(Parameters(RelationParams {
                function: "foo".to_string(),
                graph: None,
            }))
            .await
            .expect("tool call");
        assert_ne!(callees.is_error, Some(true));
        let json = payload(&callees);
        assert_eq!(json["callees"], serde_json::json!(["b.py:bar"]));
        assert_eq!(json["count"], 1);

        let callers = server
            .get_callers(Parameters(RelationParams {
                function: "bar".to_string(),
                graph: None,
            }))
            .await
            .expect("tool call");
        assert_eq!(payload(&callers)["callers"], serde_json::json!(["a.py:foo"]));
    }

    #[tokio::test]
    async fn unknown_function_details_is_an_error_result() {
        let (_dir, server) = server_with_snapshot();
        let result = server
            .get_function_details(Parameters(FunctionParams {
                function: "missing".to_string(),
            }))
            .await
            .expect("tool call");
        assert_eq!(result.is_error, Some(true));
        let json = payload(&result);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Function not found");
    }

    #[tokio::test]
    async fn call_chain_defaults_depth_and_rejects_negative() {
        let (_dir, server) = server_with_snapshot();
        let chain = server
            .get_call_chain(Parameters(CallChainParams {
                function: "foo".to_string(),
                max_depth: None,
            }))
            .await
            .expect("tool call");
        let json = payload(&chain);
        assert_eq!(json["max_depth"], 3);
        assert_eq!(json["chain"], serde_json::json!(["a.py:foo", "b.py:bar"]));

        let negative = server
            .get_call_chain(Parameters(CallChainParams {
                function: "foo".to_string(),
                max_depth: Some(-2),
            }))
            .await
            .expect("tool call");
        assert_eq!(negative.is_error, Some(true));
    }

    #[tokio::test]
    async fn clones_share_one_index_build() {
        let (_dir, server) = server_with_snapshot();
        let other = server.clone();
        let (left, right) = tokio::join!(
            server.search_functions(Parameters(SearchFunctionsParams {
                query: "O".to_string(),
            })),
            other.search_functions(Parameters(SearchFunctionsParams {
                query: String::new(),
            })),
        );
        assert_eq!(payload(&left.expect("tool call"))["results"], serde_json::json!(["foo"]));
        assert_eq!(payload(&right.expect("tool call"))["count"], 2);
        assert_eq!(server.control().loader().build_count(), 1);
    }
}
