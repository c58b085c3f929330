//! HTTP client for the hosted model API.
//!
//! Speaks either the Anthropic Messages API or an OpenAI-compatible chat
//! completions API. Every attempt is bounded by the reqwest client timeout;
//! transient failures are retried per [`RetryPolicy`] and every attempt and
//! backoff sleep is raced against the caller's [`CancelSignal`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use caserelay_core::config::{LlmConfig, LlmProvider};
use caserelay_core::domain::gateway::{GatewayRequest, GatewayResponse, TokenUsage};
use caserelay_core::errors::{GatewayError, TransientCause};

use crate::cancel::CancelSignal;
use crate::retry::{classify_status, honors_retry_after, parse_retry_after, RetryPolicy, StatusClass};
use crate::GatewayClient;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_DETAIL_CHARS: usize = 512;

#[derive(Clone, Debug)]
pub struct HttpGateway {
    client: Client,
    provider: LlmProvider,
    endpoint: String,
    policy: RetryPolicy,
}

#[derive(Debug)]
enum AttemptError {
    Transient { cause: TransientCause, detail: String, retry_after: Option<Duration> },
    Fatal(GatewayError),
}

impl HttpGateway {
    pub fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| GatewayError::Client(error.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &LlmConfig) -> Self {
        let endpoint = endpoint_for(config.provider, &config.effective_base_url());
        Self { client, provider: config.provider, endpoint, policy: RetryPolicy::from_config(config) }
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn attempt(&self, request: &GatewayRequest) -> Result<GatewayResponse, AttemptError> {
        let api_key = request.api_key.expose_secret();
        let builder = self.client.post(&self.endpoint);
        let builder = match self.provider {
            LlmProvider::Anthropic => builder
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&AnthropicRequest::from_gateway(request)),
            LlmProvider::OpenAi => {
                builder.bearer_auth(api_key).json(&OpenAiRequest::from_gateway(request))
            }
        };

        let response = builder.send().await.map_err(transport_failure)?;
        let status = response.status().as_u16();

        match classify_status(status) {
            StatusClass::Success => {}
            StatusClass::Auth => return Err(AttemptError::Fatal(GatewayError::Auth { status })),
            StatusClass::Rejected => {
                let detail = summarize_body(&response.text().await.unwrap_or_default());
                return Err(AttemptError::Fatal(GatewayError::RequestRejected { status, detail }));
            }
            StatusClass::Transient => {
                let retry_after = if honors_retry_after(status) {
                    response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|value| value.to_str().ok())
                        .and_then(parse_retry_after)
                } else {
                    None
                };
                let cause = match status {
                    408 => TransientCause::Timeout,
                    429 => TransientCause::RateLimited,
                    other => TransientCause::Upstream(other),
                };
                let detail = summarize_body(&response.text().await.unwrap_or_default());
                return Err(AttemptError::Transient { cause, detail, retry_after });
            }
        }

        let body = response.text().await.map_err(transport_failure)?;
        Ok(match self.provider {
            LlmProvider::Anthropic => decode_anthropic(status, &body),
            LlmProvider::OpenAi => decode_openai(status, &body),
        })
    }
}

#[async_trait]
impl GatewayClient for HttpGateway {
    async fn call(
        &self,
        request: GatewayRequest,
        cancel: CancelSignal,
    ) -> Result<GatewayResponse, GatewayError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0_u32;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }

            debug!(event_name = "gateway.attempt.started", attempt, max_attempts, endpoint = %self.endpoint);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                outcome = self.attempt(&request) => outcome,
            };

            match outcome {
                Ok(mut response) => {
                    response.attempts = attempt;
                    return Ok(response);
                }
                Err(AttemptError::Fatal(error)) => return Err(error),
                Err(AttemptError::Transient { cause, detail, retry_after }) => {
                    if attempt >= max_attempts {
                        return Err(GatewayError::Transient { cause, attempts: attempt, detail });
                    }
                    let delay = self.policy.delay_for(attempt, retry_after);
                    warn!(
                        event_name = "gateway.attempt.retrying",
                        attempt,
                        max_attempts,
                        cause = %cause,
                        delay_ms = delay.as_millis() as u64,
                        "transient gateway failure; backing off"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

fn endpoint_for(provider: LlmProvider, base_url: &str) -> String {
    match provider {
        LlmProvider::Anthropic => format!("{base_url}/v1/messages"),
        LlmProvider::OpenAi => format!("{base_url}/v1/chat/completions"),
    }
}

fn transport_failure(error: reqwest::Error) -> AttemptError {
    if error.is_builder() {
        return AttemptError::Fatal(GatewayError::Client(error.to_string()));
    }
    let cause = if error.is_timeout() { TransientCause::Timeout } else { TransientCause::Network };
    AttemptError::Transient { cause, detail: error.to_string(), retry_after: None }
}

fn summarize_body(body: &str) -> String {
    body.chars().take(MAX_DETAIL_CHARS).collect()
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [ChatMessage<'a>; 1],
}

impl<'a> AnthropicRequest<'a> {
    fn from_gateway(request: &'a GatewayRequest) -> Self {
        Self {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: request.prompt.system(),
            messages: [ChatMessage { role: "user", content: request.prompt.user() }],
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

impl<'a> OpenAiRequest<'a> {
    fn from_gateway(request: &'a GatewayRequest) -> Self {
        Self {
            model: &request.model,
            max_tokens: request.max_tokens,
            messages: [
                ChatMessage { role: "system", content: request.prompt.system() },
                ChatMessage { role: "user", content: request.prompt.user() },
            ],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamErrorBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

impl UpstreamErrorBody {
    fn describe(&self) -> String {
        match (self.kind.as_deref(), self.message.as_deref()) {
            (Some(kind), Some(message)) => format!("{kind}: {message}"),
            (Some(value), None) | (None, Some(value)) => value.to_string(),
            (None, None) => "upstream reported an unspecified error".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
    model: Option<String>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
    error: Option<UpstreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    model: Option<String>,
    usage: Option<OpenAiUsage>,
    error: Option<UpstreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

fn decode_anthropic(status: u16, body: &str) -> GatewayResponse {
    let parsed = match serde_json::from_str::<AnthropicResponse>(body) {
        Ok(parsed) => parsed,
        Err(error) => {
            return GatewayResponse::failed(status, format!("undecodable response body: {error}"))
        }
    };
    if let Some(error) = parsed.error {
        return GatewayResponse::failed(status, error.describe());
    }

    let text = parsed
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<String>();
    let usage = parsed
        .usage
        .map(|usage| TokenUsage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        })
        .unwrap_or_default();

    finish(status, text, parsed.stop_reason, parsed.model, usage)
}

fn decode_openai(status: u16, body: &str) -> GatewayResponse {
    let parsed = match serde_json::from_str::<OpenAiResponse>(body) {
        Ok(parsed) => parsed,
        Err(error) => {
            return GatewayResponse::failed(status, format!("undecodable response body: {error}"))
        }
    };
    if let Some(error) = parsed.error {
        return GatewayResponse::failed(status, error.describe());
    }

    let first = parsed.choices.into_iter().next();
    let stop_reason = first.as_ref().and_then(|choice| choice.finish_reason.clone());
    let text = first
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default();
    let usage = parsed
        .usage
        .map(|usage| TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
        .unwrap_or_default();

    finish(status, text, stop_reason, parsed.model, usage)
}

fn finish(
    status: u16,
    text: String,
    stop_reason: Option<String>,
    model: Option<String>,
    usage: TokenUsage,
) -> GatewayResponse {
    let mut response = if text.trim().is_empty() {
        GatewayResponse::failed(status, "response carried no text content")
    } else {
        GatewayResponse::text(status, text)
    };
    response.stop_reason = stop_reason;
    response.model = model;
    response.usage = usage;
    response
}
