use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::conversion::request::generate_tool_call_id;
use crate::errors::BridgeError;
use crate::models::{
    ContentBlock, ConverseOutput, ConverseResponse, Message, Role, TokenUsage, ToolUseBlock,
};

use super::map_finish_reason;

pub fn convert_openai_to_converse_response(
    response: &ChatCompletionResponse,
) -> Result<ConverseResponse, BridgeError> {
    let choice = response
        .choices
        .as_deref()
        .and_then(|choices| choices.first())
        .ok_or(BridgeError::EmptyResponse)?;

    let mut content_blocks = Vec::new();
    if let Some(message) = choice.message.as_ref() {
        push_text_content(message.content.as_ref(), &mut content_blocks);
        push_tool_use_content(
            message.tool_calls.as_deref().unwrap_or_default(),
            &mut content_blocks,
        );
    }

    Ok(ConverseResponse {
        output: ConverseOutput {
            message: Message {
                role: Role::Assistant,
                content: content_blocks,
            },
        },
        stop_reason: map_finish_reason(choice.finish_reason.as_deref()),
        usage: usage_from_chat(response.usage.as_ref()),
    })
}

fn push_text_content(content: Option<&Value>, content_blocks: &mut Vec<ContentBlock>) {
    match content {
        None | Some(Value::Null) => {}
        Some(Value::String(text)) => {
            if !text.is_empty() {
                content_blocks.push(ContentBlock::Text(text.clone()));
            }
        }
        Some(other) => content_blocks.push(ContentBlock::Text(other.to_string())),
    }
}

fn push_tool_use_content(tool_calls: &[ChatToolCall], content_blocks: &mut Vec<ContentBlock>) {
    for tool_call in tool_calls {
        let function = tool_call.function.as_ref();
        let arguments = function
            .and_then(|function| function.arguments.as_deref())
            .unwrap_or("{}");

        content_blocks.push(ContentBlock::ToolUse(ToolUseBlock {
            tool_use_id: Some(
                tool_call
                    .id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(generate_tool_call_id),
            ),
            name: function
                .and_then(|function| function.name.clone())
                .unwrap_or_default(),
            input: parse_tool_arguments(arguments),
        }));
    }
}

/// Unparseable arguments are kept as `{"raw": ...}` instead of failing the response.
fn parse_tool_arguments(arguments_raw: &str) -> Value {
    serde_json::from_str::<Value>(arguments_raw).unwrap_or_else(|error| {
        warn!(
            phase = "tool_arguments_not_json",
            %error,
            "Keeping unparseable tool arguments as raw text"
        );
        let mut wrapped = Map::new();
        wrapped.insert("raw".to_string(), Value::String(arguments_raw.to_string()));
        Value::Object(wrapped)
    })
}

fn usage_from_chat(usage: Option<&ChatUsage>) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.and_then(|value| value.prompt_tokens).unwrap_or(0),
        output_tokens: usage.and_then(|value| value.completion_tokens).unwrap_or(0),
        total_tokens: usage.and_then(|value| value.total_tokens).unwrap_or(0),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    choices: Option<Vec<ChatChoice>>,
    usage: Option<ChatUsage>,
}

impl ChatCompletionResponse {
    pub(crate) fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    finish_reason: Option<String>,
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<Value>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    id: Option<String>,
    function: Option<ChatFunctionPayload>,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionPayload {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::conversion::request::convert_converse_to_openai;
    use crate::models::{ConverseRequest, StopReason};

    fn parse(value: Value) -> ChatCompletionResponse {
        serde_json::from_value(value).expect("response should deserialize")
    }

    #[test]
    fn missing_choices_is_empty_response() {
        let error = convert_openai_to_converse_response(&parse(json!({"id": "x", "choices": []})))
            .expect_err("should fail");
        assert!(matches!(error, BridgeError::EmptyResponse));

        let error = convert_openai_to_converse_response(&parse(json!({"id": "x"})))
            .expect_err("should fail");
        assert!(matches!(error, BridgeError::EmptyResponse));
    }

    #[test]
    fn length_finish_maps_to_max_tokens_with_one_text_block() {
        let converted = convert_openai_to_converse_response(&parse(json!({
            "id": "chatcmpl_1",
            "choices": [{"finish_reason": "length", "message": {"role": "assistant", "content": "partial answ"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
        })))
        .expect("convert");

        assert_eq!(converted.stop_reason, StopReason::MaxTokens);
        assert_eq!(
            converted.output.message.content,
            vec![ContentBlock::Text("partial answ".to_string())]
        );
        assert_eq!(
            converted.usage,
            TokenUsage {
                input_tokens: 12,
                output_tokens: 4,
                total_tokens: 16
            }
        );
    }

    #[test]
    fn empty_or_null_content_yields_no_text_block() {
        let converted = convert_openai_to_converse_response(&parse(json!({
            "choices": [{"finish_reason": "stop", "message": {"content": ""}}]
        })))
        .expect("convert");
        assert!(converted.output.message.content.is_empty());
        assert_eq!(converted.usage, TokenUsage::default());
    }

    #[test]
    fn null_tool_calls_and_choices_are_tolerated() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"finish_reason":"stop","message":{"content":"hi","tool_calls":null}}]}"#,
        )
        .expect("null tool_calls should deserialize");
        let converted = convert_openai_to_converse_response(&response).expect("convert");
        assert_eq!(converted.stop_reason, StopReason::EndTurn);
        assert_eq!(
            converted.output.message.content,
            vec![ContentBlock::Text("hi".to_string())]
        );

        let error = convert_openai_to_converse_response(&parse(json!({"choices": null})))
            .expect_err("should fail");
        assert!(matches!(error, BridgeError::EmptyResponse));
    }

    #[test]
    fn tool_calls_keep_order_and_fallback_to_raw_arguments() {
        let converted = convert_openai_to_converse_response(&parse(json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "call_a", "type": "function", "function": {"name": "first", "arguments": "{\"n\":1}"}},
                        {"id": "call_b", "type": "function", "function": {"name": "second", "arguments": "{not json"}}
                    ]
                }
            }]
        })))
        .expect("convert");

        assert_eq!(converted.stop_reason, StopReason::ToolUse);
        let content = &converted.output.message.content;
        assert_eq!(content.len(), 2);

        let ContentBlock::ToolUse(first) = &content[0] else {
            panic!("expected tool use");
        };
        assert_eq!(first.tool_use_id.as_deref(), Some("call_a"));
        assert_eq!(first.name, "first");
        assert_eq!(first.input, json!({"n": 1}));

        let ContentBlock::ToolUse(second) = &content[1] else {
            panic!("expected tool use");
        };
        assert_eq!(second.input, json!({"raw": "{not json"}));
    }

    #[test]
    fn tool_call_without_id_gets_generated_id() {
        let converted = convert_openai_to_converse_response(&parse(json!({
            "choices": [{"message": {"tool_calls": [{"type": "function", "function": {"name": "f"}}]}}]
        })))
        .expect("convert");

        let ContentBlock::ToolUse(tool_use) = &converted.output.message.content[0] else {
            panic!("expected tool use");
        };
        assert!(tool_use.tool_use_id.as_deref().unwrap_or_default().starts_with("call_"));
        assert_eq!(tool_use.input, json!({}));
    }

    #[test]
    fn assistant_content_survives_outbound_and_back() {
        let assistant = Message::assistant(vec![
            ContentBlock::Text("checking".to_string()),
            ContentBlock::ToolUse(ToolUseBlock {
                tool_use_id: Some("call_rt".to_string()),
                name: "lookup".to_string(),
                input: json!({"q": "rust", "limit": 3}),
            }),
        ]);
        let request = ConverseRequest {
            model_id: "gpt-4o".to_string(),
            messages: vec![assistant.clone()],
            system: None,
            tool_config: None,
            inference_config: None,
        };

        let wire = convert_converse_to_openai(&request, Some(false)).expect("convert");
        let wire_message = serde_json::to_value(&wire.messages[0]).expect("serialize");
        let response = parse(json!({
            "choices": [{"finish_reason": "tool_calls", "message": wire_message}]
        }));

        let converted = convert_openai_to_converse_response(&response).expect("convert back");
        assert_eq!(converted.output.message, assistant);
    }
}
