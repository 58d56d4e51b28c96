use serde::Deserialize;

use crate::models::TokenUsage;

pub fn parse_stream_chunk(data_line: &str) -> Result<OpenAiStreamChunk, serde_json::Error> {
    serde_json::from_str(data_line)
}

pub fn first_choice(parsed_chunk: &OpenAiStreamChunk) -> Option<&StreamChoice> {
    parsed_chunk.choices.as_deref()?.first()
}

/// Usage snapshots replace the running counters rather than adding to them.
pub fn usage_snapshot(parsed_chunk: &OpenAiStreamChunk) -> Option<TokenUsage> {
    let usage = parsed_chunk.usage.as_ref()?;

    let input_tokens = usage.prompt_tokens.unwrap_or(0);
    let output_tokens = usage.completion_tokens.unwrap_or(0);
    Some(TokenUsage {
        input_tokens,
        output_tokens,
        total_tokens: usage
            .total_tokens
            .unwrap_or_else(|| input_tokens.saturating_add(output_tokens)),
    })
}

pub fn tool_call_index(tool_call_delta: &ToolCallDelta) -> u64 {
    tool_call_delta.index.unwrap_or(0)
}

pub fn tool_name_delta(tool_call_delta: &ToolCallDelta) -> Option<&str> {
    tool_call_delta
        .function
        .as_ref()
        .and_then(|function| function.name.as_deref())
}

pub fn tool_arguments_delta(tool_call_delta: &ToolCallDelta) -> Option<&str> {
    tool_call_delta
        .function
        .as_ref()
        .and_then(|function| function.arguments.as_deref())
}

#[derive(Debug, Deserialize)]
pub struct OpenAiStreamChunk {
    pub choices: Option<Vec<StreamChoice>>,
    pub usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    pub finish_reason: Option<String>,
    pub delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
pub struct StreamDelta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallDelta {
    pub index: Option<u64>,
    pub id: Option<String>,
    pub function: Option<ToolFunctionDelta>,
}

#[derive(Debug, Deserialize)]
pub struct ToolFunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}
