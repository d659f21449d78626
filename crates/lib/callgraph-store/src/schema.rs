pub const METHODS_FILE: &str = "methods.csv";
pub const CALLS_FILE: &str = "calls.csv";

pub const DOT_EXTENSION: &str = "dot";
pub const PYTHON_EXTENSION: &str = "py";

pub const COL_METHOD_ID: &str = "method_id";
pub const COL_FULL_NAME: &str = "full_name";
pub const COL_SIGNATURE: &str = "signature";
pub const COL_FILE: &str = "file";
pub const COL_CALLER_ID: &str = "caller_id";
pub const COL_CALLEE_ID: &str = "callee_id";
pub const COL_CALLEE_FULL_NAME: &str = "callee_full_name";
pub const COL_LINE_NUMBER: &str = "line_number";
pub const COL_LINE: &str = "line";

/// Callee id emitted by the exporter when a call target could not be resolved.
pub const UNRESOLVED_CALLEE_ID: &str = "-1";
/// Callee name emitted by the exporter when the callee name is unknown.
pub const UNKNOWN_FULL_NAME: &str = "<unknownFullName>";

pub const UNKNOWN_OPERATION: &str = "unknown";
pub const MODULE_SCOPE: &str = "<module>";

/// Collapses a qualified name such as `path/file.py:Class.method` to `method`.
///
/// Names without a `:` separator are returned unchanged.
#[must_use]
pub fn short_name(full_name: &str) -> &str {
    match full_name.rsplit_once(':') {
        Some((_, remainder)) => remainder.rsplit('.').next().unwrap_or(remainder),
        None => full_name,
    }
}

/// Builds the record id used for numeric DOT nodes, which are only unique
/// within their own graph file.
#[must_use]
pub fn make_scoped_node_id(graph_id: &str, node: u64) -> String {
    format!("{graph_id}:{node}")
}

/// Builds a qualified name from a scope (file or graph) and a local name.
#[must_use]
pub fn make_full_name(scope: &str, local_name: &str) -> String {
    format!("{scope}:{local_name}")
}
