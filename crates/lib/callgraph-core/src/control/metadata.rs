use callgraph_store::models::{GraphSummary, IndexCounts};
use serde::{Deserialize, Serialize};

use super::CallGraphControlPlane;

/// One input file the index was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    /// Whether the file still exists at the time of the call.
    pub exists: bool,
}

/// Index statistics plus presence flags for the backing input files.
///
/// `methods_loaded` and `calls_loaded` describe the relational layout and are
/// reported for every format; `sources` carries a flag per file actually read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub counts: Option<IndexCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub out_dir: String,
    pub methods_file: String,
    pub calls_file: String,
    pub methods_loaded: bool,
    pub calls_loaded: bool,
    pub sources: Vec<SourceFile>,
    pub loader_state: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphsResponse {
    pub graphs: Vec<GraphSummary>,
    pub count: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallGraphControlPlane {
    /// Reports index counts and which input files are present right now.
    pub async fn get_stats(&self) -> StatsResponse {
        let outcome = self.index().await;
        let source = self.loader().source();
        let methods_path = source.methods_path();
        let calls_path = source.calls_path();
        let mut response = StatsResponse {
            counts: None,
            format: None,
            out_dir: source.root.display().to_string(),
            methods_file: methods_path.display().to_string(),
            calls_file: calls_path.display().to_string(),
            methods_loaded: methods_path.is_file(),
            calls_loaded: calls_path.is_file(),
            sources: Vec::new(),
            loader_state: self.loader_state().as_str().to_string(),
            success: false,
            error: None,
        };
        match outcome {
            Ok(index) => {
                response.counts = Some(index.counts());
                response.format = Some(index.format().as_str().to_string());
                response.sources = index
                    .sources()
                    .iter()
                    .map(|path| SourceFile {
                        path: path.display().to_string(),
                        exists: path.is_file(),
                    })
                    .collect();
                response.success = true;
            }
            Err(err) => response.error = Some(err.to_string()),
        }
        response
    }

    /// Lists the graphs present in the snapshot with per-graph counts.
    pub async fn list_graphs(&self) -> GraphsResponse {
        match self.index().await {
            Ok(index) => {
                let graphs = index.graphs();
                GraphsResponse {
                    count: graphs.len(),
                    graphs,
                    success: true,
                    error: None,
                }
            }
            Err(err) => GraphsResponse {
                graphs: Vec::new(),
                count: 0,
                success: false,
                error: Some(err.to_string()),
            },
        }
    }
}
