use serde_json::Value;
use uuid::Uuid;

use crate::conversion::request::models::{WireMessage, WireToolCall};
use crate::conversion::request::user::join_text_blocks;
use crate::errors::BridgeError;
use crate::models::{ContentBlock, Message, ToolUseBlock};

pub fn convert_assistant_message(message: &Message) -> Result<WireMessage, BridgeError> {
    let has_text = message
        .content
        .iter()
        .any(|block| matches!(block, ContentBlock::Text(_)));
    let content = has_text.then(|| join_text_blocks(&message.content));

    let mut tool_calls = Vec::new();
    for block in &message.content {
        if let ContentBlock::ToolUse(tool_use) = block {
            tool_calls.push(build_tool_call(tool_use)?);
        }
    }

    Ok(WireMessage::Assistant {
        content,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
    })
}

fn build_tool_call(tool_use: &ToolUseBlock) -> Result<WireToolCall, BridgeError> {
    let id = tool_use
        .tool_use_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(generate_tool_call_id);

    Ok(WireToolCall::function(
        id,
        tool_use.name.clone(),
        encode_arguments(&tool_use.input)?,
    ))
}

/// String inputs are assumed to already hold JSON text.
fn encode_arguments(input: &Value) -> Result<String, BridgeError> {
    match input {
        Value::String(raw) => Ok(raw.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

pub(crate) fn generate_tool_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}
