use serde_json::{Map, Value};

use crate::constants::{TOOL_CHOICE_AUTO, TOOL_FUNCTION};
use crate::conversion::request::models::{ChatCompletionRequest, WireFunctionDefinition, WireTool};
use crate::models::{InferenceConfiguration, ToolConfiguration, ToolSpec};

pub fn add_inference_fields(
    inference: Option<&InferenceConfiguration>,
    wire_request: &mut ChatCompletionRequest,
) {
    let Some(inference) = inference else {
        return;
    };
    wire_request.max_tokens = inference.max_tokens;
    wire_request.temperature = inference.temperature;
    wire_request.top_p = inference.top_p;
}

/// `tool_choice` is only sent alongside a non-empty tool list.
pub fn add_tools(tool_config: Option<&ToolConfiguration>, wire_request: &mut ChatCompletionRequest) {
    let Some(tool_config) = tool_config else {
        return;
    };

    let converted_tools: Vec<WireTool> = tool_config
        .tools
        .iter()
        .filter_map(|tool| tool.tool_spec.as_ref())
        .map(convert_tool_spec)
        .collect();
    if converted_tools.is_empty() {
        return;
    }

    wire_request.tools = Some(converted_tools);
    wire_request.tool_choice = Some(TOOL_CHOICE_AUTO.to_string());
}

fn convert_tool_spec(spec: &ToolSpec) -> WireTool {
    WireTool {
        kind: TOOL_FUNCTION.to_string(),
        function: WireFunctionDefinition {
            name: spec.name.clone(),
            description: spec.description.clone().unwrap_or_default(),
            parameters: spec
                .input_schema
                .as_ref()
                .map(|schema| schema.json.clone())
                .unwrap_or_else(|| Value::Object(Map::new())),
        },
    }
}
