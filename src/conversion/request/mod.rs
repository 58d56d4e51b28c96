mod assistant;
mod models;
mod system;
mod tool_result;
mod tools;
mod user;

pub use models::{
    ChatCompletionRequest, WireFunctionCall, WireFunctionDefinition, WireMessage, WireTool,
    WireToolCall,
};

pub(crate) use assistant::generate_tool_call_id;

use tracing::{debug, trace};

use crate::errors::BridgeError;
use crate::models::{ConverseRequest, Message, Role};
use assistant::convert_assistant_message;
use system::extract_system_text;
use tool_result::{convert_tool_results, has_tool_results};
use tools::{add_inference_fields, add_tools};
use user::{convert_user_message, has_text_content};

/// Builds the chat-completions request for one call.
///
/// `stream` defaults to `true` when the caller does not specify it. The only
/// failure is a tool-use input that cannot be encoded as JSON.
pub fn convert_converse_to_openai(
    request: &ConverseRequest,
    stream: Option<bool>,
) -> Result<ChatCompletionRequest, BridgeError> {
    let mut wire_messages: Vec<WireMessage> = Vec::new();

    push_system_message(request, &mut wire_messages);
    convert_message_list(&request.messages, &mut wire_messages)?;

    let mut wire_request = ChatCompletionRequest {
        model: request.model_id.clone(),
        messages: wire_messages,
        tools: None,
        tool_choice: None,
        max_tokens: None,
        temperature: None,
        top_p: None,
        stream: stream.unwrap_or(true),
    };
    add_inference_fields(request.inference_config.as_ref(), &mut wire_request);
    add_tools(request.tool_config.as_ref(), &mut wire_request);

    trace!(
        phase = "upstream_request_full",
        wire_request = ?wire_request,
        "Converted request for upstream (full)"
    );

    debug!(
        phase = "upstream_request_summary",
        upstream_model = %wire_request.model,
        stream = wire_request.stream,
        max_tokens = ?wire_request.max_tokens,
        temperature = ?wire_request.temperature,
        messages_len = wire_request.messages.len(),
        tools_len = wire_request.tools.as_ref().map(Vec::len).unwrap_or(0),
        "Converted request for upstream (summary)"
    );

    Ok(wire_request)
}

fn push_system_message(request: &ConverseRequest, wire_messages: &mut Vec<WireMessage>) {
    let Some(system) = &request.system else {
        return;
    };
    let system_text = extract_system_text(system);
    if system_text.is_empty() {
        return;
    }
    wire_messages.push(WireMessage::System {
        content: system_text,
    });
}

fn convert_message_list(
    messages: &[Message],
    wire_messages: &mut Vec<WireMessage>,
) -> Result<(), BridgeError> {
    for message in messages {
        match message.role {
            Role::User => {
                let tool_results = convert_tool_results(message);
                wire_messages.extend(tool_results);

                // a turn is never dropped, even with nothing to say
                if has_text_content(message) || !has_tool_results(message) {
                    wire_messages.push(convert_user_message(message));
                }
            }
            Role::Assistant => wire_messages.push(convert_assistant_message(message)?),
        }
    }
    Ok(())
}
