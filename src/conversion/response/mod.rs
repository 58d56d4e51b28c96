mod chat;

pub use chat::{ChatCompletionResponse, convert_openai_to_converse_response};

use crate::constants::{FINISH_LENGTH, FINISH_TOOL_CALLS};
use crate::models::StopReason;

/// Exact, case-sensitive; anything unrecognised (or absent) ends the turn.
pub fn map_finish_reason(finish_reason: Option<&str>) -> StopReason {
    match finish_reason {
        Some(FINISH_TOOL_CALLS) => StopReason::ToolUse,
        Some(FINISH_LENGTH) => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}

#[cfg(test)]
mod tests {
    use super::map_finish_reason;
    use crate::models::StopReason;

    #[test]
    fn maps_finish_reasons_exactly() {
        assert_eq!(map_finish_reason(Some("tool_calls")), StopReason::ToolUse);
        assert_eq!(map_finish_reason(Some("length")), StopReason::MaxTokens);
        assert_eq!(map_finish_reason(Some("stop")), StopReason::EndTurn);
        assert_eq!(map_finish_reason(None), StopReason::EndTurn);
        assert_eq!(map_finish_reason(Some("TOOL_CALLS")), StopReason::EndTurn);
        assert_eq!(map_finish_reason(Some("function_call")), StopReason::EndTurn);
    }
}
