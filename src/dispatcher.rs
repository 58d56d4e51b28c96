use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::conversion::request::convert_converse_to_openai;
use crate::conversion::response::{ChatCompletionResponse, convert_openai_to_converse_response};
use crate::conversion::stream::{EventStream, translate_event_stream};
use crate::errors::BridgeError;
use crate::models::{ConverseRequest, ConverseResponse};
use crate::retry::RetryPolicy;
use crate::upstream::{UpstreamClient, read_json_body};

/// Entry point for one logical call against a chat-completions endpoint.
///
/// Calls share only the read-only configuration and the HTTP client; every
/// streamed response gets its own translator session.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    config: Config,
    upstream: UpstreamClient,
    retry_policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(config: Config) -> Result<Self, BridgeError> {
        let upstream = UpstreamClient::new(config.custom_headers.clone())?;
        let retry_policy = RetryPolicy {
            legacy_matching: config.legacy_retry_matching,
            ..RetryPolicy::default()
        };

        Ok(Self {
            config,
            upstream,
            retry_policy,
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sends one non-streaming request and returns the complete response.
    pub async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse, BridgeError> {
        let endpoint = self.config.endpoint()?;
        self.check_model(&request.model_id);

        let wire_request = convert_converse_to_openai(request, Some(false))?;
        let wire_request = &wire_request;
        let timeout = non_zero_secs(self.config.request_timeout);

        let response: ChatCompletionResponse = self
            .retry_policy
            .run("converse", |attempt| async move {
                debug!(phase = "converse_attempt", attempt, "Dispatching non-streaming request");
                let response = self
                    .upstream
                    .send_chat_completion(endpoint, wire_request, timeout, "non_stream")
                    .await?;
                read_json_body(response, "non_stream").await
            })
            .await?;

        debug!(
            phase = "converse_response",
            response_id = response.id().unwrap_or("<missing>"),
            "Translating upstream response"
        );
        convert_openai_to_converse_response(&response)
    }

    /// Opens a streaming call and returns the lazy event sequence.
    ///
    /// Retries only cover obtaining a successful response; once events are
    /// flowing there is no resumption.
    pub async fn converse_stream(&self, request: &ConverseRequest) -> Result<EventStream, BridgeError> {
        self.open_stream(request, None).await
    }

    /// Like [`Dispatcher::converse_stream`], but ends the sequence with
    /// `BridgeError::Cancelled` once `cancellation` fires.
    pub async fn converse_stream_with_cancellation(
        &self,
        request: &ConverseRequest,
        cancellation: CancellationToken,
    ) -> Result<EventStream, BridgeError> {
        self.open_stream(request, Some(cancellation)).await
    }

    async fn open_stream(
        &self,
        request: &ConverseRequest,
        cancellation: Option<CancellationToken>,
    ) -> Result<EventStream, BridgeError> {
        let endpoint = self.config.endpoint()?;
        self.check_model(&request.model_id);

        let wire_request = convert_converse_to_openai(request, Some(true))?;
        let wire_request = &wire_request;
        let timeout = self.config.stream_request_timeout.and_then(non_zero_secs);

        let response = self
            .retry_policy
            .run("converse_stream", |attempt| async move {
                debug!(phase = "converse_stream_attempt", attempt, "Dispatching streaming request");
                self.upstream
                    .send_chat_completion(endpoint, wire_request, timeout, "stream")
                    .await
            })
            .await?;

        Ok(translate_event_stream(response.bytes_stream(), cancellation))
    }

    fn check_model(&self, model_id: &str) {
        if !self.config.is_known_model(model_id) {
            warn!(
                phase = "model_routing",
                model_id,
                known_models = ?self.config.custom_models,
                "Requested model is not in the configured model list; forwarding as-is"
            );
        }
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
