use std::borrow::Cow;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Client;
use reqwest::header::{
    ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::config::Endpoint;
use crate::constants::{CHAT_COMPLETIONS_PATH, USER_AGENT_VALUE};
use crate::errors::BridgeError;

const BODY_PREVIEW_LIMIT: usize = 1024;

/// Thin HTTP layer over the chat-completions endpoint. Holds no per-call state.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: Client,
    custom_headers: HashMap<String, String>,
}

impl UpstreamClient {
    pub fn new(custom_headers: HashMap<String, String>) -> Result<Self, BridgeError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            custom_headers,
        })
    }

    /// Posts `body` and returns the response once a 2xx status is confirmed.
    pub async fn send_chat_completion<T: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint<'_>,
        body: &T,
        timeout: Option<Duration>,
        request_kind: &'static str,
    ) -> Result<reqwest::Response, BridgeError> {
        let url = format!(
            "{}{}",
            endpoint.base_url.trim_end_matches('/'),
            CHAT_COMPLETIONS_PATH
        );

        let mut request_builder = self
            .client
            .post(&url)
            .headers(build_upstream_headers(endpoint.api_key, &self.custom_headers))
            .json(body);

        if let Some(duration) = timeout {
            request_builder = request_builder.timeout(duration);
        }

        let timeout_secs = timeout.map(|value| value.as_secs());
        debug!(
            phase = "upstream_request_start",
            request_kind,
            url = %url,
            timeout_secs = ?timeout_secs,
            "Sending upstream request"
        );
        let request_started = Instant::now();
        let response = request_builder.send().await.map_err(|error| {
            log_send_stage_error(&error, timeout_secs, request_kind, request_started.elapsed());
            BridgeError::Http(error)
        })?;

        debug!(
            phase = "upstream_response_headers",
            request_kind,
            status = %response.status(),
            content_type = %response_content_type(&response),
            content_length = ?response.content_length(),
            elapsed_ms = request_started.elapsed().as_millis() as u64,
            "Received upstream response headers"
        );

        if response.status().is_success() {
            return Ok(response);
        }

        Err(handle_http_error_response(response, request_kind).await)
    }
}

/// Reads a successful non-streaming body and decodes it as `T`.
pub async fn read_json_body<T: DeserializeOwned>(
    response: reqwest::Response,
    request_kind: &'static str,
) -> Result<T, BridgeError> {
    let status = response.status();
    let content_type = response_content_type(&response);
    let body_read_started = Instant::now();
    let body = response.bytes().await.map_err(|error| {
        error!(
            phase = "upstream_body_read_failed",
            request_kind,
            status = %status,
            elapsed_ms = body_read_started.elapsed().as_millis() as u64,
            "Failed to read upstream response body: {error}"
        );
        BridgeError::Http(error)
    })?;

    debug!(
        phase = "upstream_success_body_read_done",
        request_kind,
        status = %status,
        body_bytes = body.len(),
        elapsed_ms = body_read_started.elapsed().as_millis() as u64,
        "Read upstream success response body"
    );

    decode_json_body(status, &content_type, &body)
}

async fn handle_http_error_response(
    response: reqwest::Response,
    request_kind: &'static str,
) -> BridgeError {
    let status = response.status();
    let content_type = response_content_type(&response);
    let text = match response.text().await {
        Ok(value) => value,
        Err(error) => {
            warn!(
                phase = "upstream_error_body_read_failed",
                request_kind,
                status = %status,
                "Failed to read upstream error response body: {error}"
            );
            String::new()
        }
    };

    warn!(
        phase = "upstream_http_error",
        request_kind,
        status = %status,
        content_type = %content_type,
        body_bytes = text.len(),
        body_preview = %preview_text(&text, BODY_PREVIEW_LIMIT),
        "Upstream returned non-success status"
    );

    BridgeError::Transport {
        status: status.as_u16(),
        body: text,
    }
}

fn decode_json_body<T: DeserializeOwned>(
    status: reqwest::StatusCode,
    content_type: &str,
    body: &[u8],
) -> Result<T, BridgeError> {
    serde_json::from_slice::<T>(body).map_err(|error| {
        let body_preview = preview_bytes(body, BODY_PREVIEW_LIMIT);
        BridgeError::Decode(format!(
            "status: {status}, content-type: {content_type}, body-preview: {body_preview}: {error}"
        ))
    })
}

fn log_send_stage_error(
    error: &reqwest::Error,
    timeout_secs: Option<u64>,
    request_kind: &str,
    elapsed: Duration,
) {
    let elapsed_ms = elapsed.as_millis() as u64;

    if error.is_timeout() {
        error!(
            phase = "upstream_connect_timeout",
            request_kind,
            timeout_secs = ?timeout_secs,
            elapsed_ms,
            "Upstream timeout before response headers"
        );
        return;
    }

    if error.is_connect() {
        error!(
            phase = "upstream_connect_error",
            request_kind,
            elapsed_ms,
            "Upstream connection failed before response headers: {error}"
        );
        return;
    }

    error!(
        phase = "upstream_request_error",
        request_kind,
        elapsed_ms,
        "Upstream request failed before response headers: {error}"
    );
}

fn response_content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "<missing>".to_string())
}

fn preview_bytes(body: &[u8], limit: usize) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => preview_text(text, limit).into_owned(),
        Err(_) => {
            let len = body.len().min(limit);
            let mut preview = String::with_capacity(len * 2 + 32);
            for byte in &body[..len] {
                use std::fmt::Write;
                let _ = write!(&mut preview, "{byte:02x}");
            }
            if body.len() > limit {
                preview.push_str("...(truncated)");
            }
            format!("<non-utf8 hex: {preview}>")
        }
    }
}

fn preview_text(text: &str, limit: usize) -> Cow<'_, str> {
    let mut iterator = text.chars();
    let preview: String = iterator.by_ref().take(limit).collect();
    if iterator.next().is_none() {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{preview}...(truncated)"))
    }
}

fn build_upstream_headers(api_key: &str, custom_headers: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    if let Ok(auth_value) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, auth_value);
    }

    for (header_name, header_value) in custom_headers {
        let Ok(name) = HeaderName::from_bytes(header_name.as_bytes()) else {
            warn!("invalid custom header name ignored: {header_name}");
            continue;
        };
        let Ok(value) = HeaderValue::from_str(header_value) else {
            warn!("invalid custom header value ignored for {header_name}");
            continue;
        };
        headers.insert(name, value);
    }

    headers
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use reqwest::StatusCode;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
    use serde::Deserialize;

    use super::{build_upstream_headers, decode_json_body, preview_bytes, preview_text};
    use crate::errors::BridgeError;

    #[test]
    fn sets_bearer_auth_and_json_content_type() {
        let headers = build_upstream_headers("sk-test", &HashMap::new());

        assert_eq!(
            headers.get(AUTHORIZATION).and_then(|raw| raw.to_str().ok()),
            Some("Bearer sk-test")
        );
        assert_eq!(
            headers.get(CONTENT_TYPE).and_then(|raw| raw.to_str().ok()),
            Some("application/json")
        );
    }

    #[test]
    fn applies_valid_custom_headers_and_skips_invalid_ones() {
        let custom_headers = HashMap::from([
            ("X-Org".to_string(), "acme".to_string()),
            ("bad header".to_string(), "ignored".to_string()),
        ]);
        let headers = build_upstream_headers("sk-test", &custom_headers);

        assert_eq!(
            headers.get("x-org").and_then(|raw| raw.to_str().ok()),
            Some("acme")
        );
        assert!(headers.get("bad header").is_none());
    }

    #[derive(Debug, Deserialize)]
    struct TestPayload {
        value: String,
    }

    #[test]
    fn decodes_valid_json_payload() {
        let payload = decode_json_body::<TestPayload>(
            StatusCode::OK,
            "application/json",
            br#"{"value":"ok"}"#,
        )
        .expect("json should decode");

        assert_eq!(payload.value, "ok");
    }

    #[test]
    fn decode_error_includes_status_content_type_and_preview() {
        let error = decode_json_body::<TestPayload>(
            StatusCode::OK,
            "text/html",
            b"<html><body>upstream gateway failed</body></html>",
        )
        .expect_err("json should fail");

        let BridgeError::Decode(message) = error else {
            panic!("expected decode error");
        };
        assert!(message.contains("status: 200 OK"));
        assert!(message.contains("content-type: text/html"));
        assert!(message.contains("body-preview: <html><body>upstream gateway failed</body></html>"));
    }

    #[test]
    fn preview_text_truncates_long_text() {
        assert_eq!(preview_text("abcdef", 3), "abc...(truncated)");
    }

    #[test]
    fn preview_bytes_formats_non_utf8_as_hex() {
        assert_eq!(preview_bytes(&[0xff, 0x00, 0x7f], 8), "<non-utf8 hex: ff007f>");
    }
}
