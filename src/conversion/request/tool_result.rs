use tracing::debug;

use crate::conversion::request::models::WireMessage;
use crate::models::{ContentBlock, Message, ToolResultBlock, ToolResultContent};

/// One `tool` wire message per tool-result block, in block order.
pub fn convert_tool_results(message: &Message) -> Vec<WireMessage> {
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(convert_tool_result_block(result)),
            _ => None,
        })
        .collect()
}

pub fn has_tool_results(message: &Message) -> bool {
    message
        .content
        .iter()
        .any(|block| matches!(block, ContentBlock::ToolResult(_)))
}

fn convert_tool_result_block(result: &ToolResultBlock) -> WireMessage {
    let tool_call_id = result.tool_use_id.clone().unwrap_or_default();
    if tool_call_id.is_empty() {
        debug!(
            phase = "tool_result_without_id",
            "Forwarding tool_result block with empty tool_call_id"
        );
    }

    WireMessage::Tool {
        content: flatten_tool_result_content(&result.content),
        tool_call_id,
    }
}

fn flatten_tool_result_content(content: &[ToolResultContent]) -> String {
    let parts: Vec<String> = content
        .iter()
        .map(|item| match item {
            ToolResultContent::Text(text) => text.clone(),
            ToolResultContent::Json(value) => value.to_string(),
        })
        .collect();
    parts.join("\n")
}
