pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_TOOL: &str = "tool";

pub const TOOL_FUNCTION: &str = "function";
pub const TOOL_CHOICE_AUTO: &str = "auto";

pub const STOP_END_TURN: &str = "end_turn";
pub const STOP_MAX_TOKENS: &str = "max_tokens";
pub const STOP_TOOL_USE: &str = "tool_use";

pub const FINISH_TOOL_CALLS: &str = "tool_calls";
pub const FINISH_LENGTH: &str = "length";

pub const SSE_DATA_PREFIX: &str = "data: ";
pub const SSE_DONE: &str = "[DONE]";

pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
pub const USER_AGENT_VALUE: &str = "converse-bridge-rust/0.1.0";

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 3;
