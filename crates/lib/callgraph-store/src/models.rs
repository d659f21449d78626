use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Canonical method (or graph node) record produced during normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodRecord {
    pub id: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,
}

impl MethodRecord {
    /// Creates a record carrying only the required identity fields.
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            signature: None,
            file: None,
            line: None,
            snippet: None,
            operation_type: None,
            graph_id: None,
        }
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    #[must_use]
    pub const fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    #[must_use]
    pub fn with_graph_id(mut self, graph_id: impl Into<String>) -> Self {
        self.graph_id = Some(graph_id.into());
        self
    }
}

/// Callee side of a call edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CallTarget {
    /// Callee identifier that is expected to exist in the method table.
    Resolved(String),
    /// Callee that could not be tied to a record; keeps the raw name when one
    /// was reported.
    Unresolved(Option<String>),
}

impl CallTarget {
    #[must_use]
    pub fn resolved_id(&self) -> Option<&str> {
        match self {
            Self::Resolved(id) => Some(id.as_str()),
            Self::Unresolved(_) => None,
        }
    }
}

/// Canonical call (or control-flow) edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallEdge {
    pub caller_id: String,
    pub target: CallTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,
}

impl CallEdge {
    pub fn new(caller_id: impl Into<String>, target: CallTarget) -> Self {
        Self {
            caller_id: caller_id.into(),
            target,
            line: None,
            graph_id: None,
        }
    }

    /// Convenience constructor for an edge between two known identifiers.
    pub fn resolved(caller_id: impl Into<String>, callee_id: impl Into<String>) -> Self {
        Self::new(caller_id, CallTarget::Resolved(callee_id.into()))
    }

    #[must_use]
    pub const fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    #[must_use]
    pub fn with_graph_id(mut self, graph_id: impl Into<String>) -> Self {
        self.graph_id = Some(graph_id.into());
        self
    }
}

/// Input flavour a snapshot was read from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    #[default]
    Auto,
    Relational,
    Dot,
    PythonSource,
}

impl SnapshotFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Relational => "relational",
            Self::Dot => "dot",
            Self::PythonSource => "python",
        }
    }
}

/// Canonical method and call tables produced by the normalizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphTables {
    pub format: SnapshotFormat,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<CallEdge>,
    /// Input files that contributed to the tables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<PathBuf>,
}

impl GraphTables {
    #[must_use]
    pub const fn new(format: SnapshotFormat) -> Self {
        Self {
            format,
            methods: Vec::new(),
            calls: Vec::new(),
            sources: Vec::new(),
        }
    }
}

/// Detail payload returned for a single function lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionDetails {
    pub method_id: String,
    pub full_name: String,
    pub signature: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,
    /// Number of records sharing the queried short name.
    pub candidate_count: usize,
}

/// Aggregate counts over a loaded index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IndexCounts {
    pub total_methods: usize,
    pub total_calls: usize,
    pub unique_functions: usize,
    pub unresolved_calls: usize,
    pub dangling_calls: usize,
    pub graph_count: usize,
}

/// Per-graph summary used for graph listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphSummary {
    pub graph_id: String,
    pub method_count: usize,
    pub call_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_target_serializes_as_tagged_variant() {
        let resolved = serde_json::to_value(CallTarget::Resolved("m2".to_string()))
            .expect("serialize resolved");
        assert_eq!(resolved, serde_json::json!({ "kind": "resolved", "value": "m2" }));

        let unresolved = serde_json::to_value(CallTarget::Unresolved(None))
            .expect("serialize unresolved");
        assert_eq!(unresolved, serde_json::json!({ "kind": "unresolved", "value": null }));
    }
}
