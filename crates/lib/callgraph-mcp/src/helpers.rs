use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// Wraps a structured response as tool output.
///
/// Failed responses become an error result carrying the same JSON, so clients
/// see the `error` field instead of a protocol failure.
pub fn respond<T: Serialize>(payload: &T, success: bool) -> Result<CallToolResult, ErrorData> {
    let content = Content::json(payload)?;
    if success {
        Ok(CallToolResult::success(vec![content]))
    } else {
        Ok(CallToolResult::error(vec![content]))
    }
}
