use serde_json::Value;
use thiserror::Error;

/// Terminal failures of a single `converse` / `converse_stream` call.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing or blank credentials / endpoint. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-streaming response carried no choice.
    #[error("upstream response contained no choices")]
    EmptyResponse,

    /// Upstream answered with a non-2xx status.
    #[error("upstream returned HTTP {status}: {}", extract_error_message_from_body(.body))]
    Transport { status: u16, body: String },

    /// A tool-use input could not be encoded for the wire request.
    #[error("failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A 2xx non-streaming body that is not a chat completion.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Reading the SSE body failed after the stream was handed out.
    #[error("streaming error from upstream: {0}")]
    Stream(String),

    #[error("stream cancelled by caller")]
    Cancelled,
}

impl BridgeError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the dispatcher may re-issue the request.
    ///
    /// Only transport errors qualify. With `legacy_matching` the rendered
    /// message is probed for `"429"` or any `"5"`, otherwise the status code
    /// must be 429 or 5xx.
    pub fn is_retryable(&self, legacy_matching: bool) -> bool {
        let Self::Transport { status, .. } = self else {
            return false;
        };

        if legacy_matching {
            let message = self.to_string();
            return message.contains("429") || message.contains('5');
        }

        *status == 429 || (500..=599).contains(status)
    }
}

pub fn extract_error_message_from_body(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(message) = parsed
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
        {
            return message.to_string();
        }
        if let Some(message) = parsed.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }

    if body.trim().is_empty() {
        "upstream API returned an empty error response".to_string()
    } else {
        body.to_string()
    }
}
