use aggs_core::dispatch::ToolReply;
use rmcp::model::{CallToolResult, Content};

pub(crate) fn tool_result(reply: ToolReply) -> CallToolResult {
    match reply {
        ToolReply::Payload(text) => CallToolResult::success(vec![Content::text(text)]),
        ToolReply::Error(message) => CallToolResult::error(vec![Content::text(message)]),
    }
}
