use secrecy::SecretString;

use crate::prompt::PromptDocument;

/// Outbound call envelope, built per call and dropped afterwards.
#[derive(Clone, Debug)]
pub struct GatewayRequest {
    pub prompt: PromptDocument,
    pub model: String,
    pub max_tokens: u32,
    pub api_key: SecretString,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// Raw upstream result. Only the gateway client and the shaper see this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayResponse {
    pub http_status: u16,
    pub content: Option<String>,
    /// Upstream-reported failure carried in an otherwise successful exchange.
    pub error: Option<String>,
    pub stop_reason: Option<String>,
    pub model: Option<String>,
    pub usage: TokenUsage,
    pub attempts: u32,
}

impl GatewayResponse {
    pub fn text(http_status: u16, content: impl Into<String>) -> Self {
        Self {
            http_status,
            content: Some(content.into()),
            error: None,
            stop_reason: None,
            model: None,
            usage: TokenUsage::default(),
            attempts: 1,
        }
    }

    pub fn failed(http_status: u16, error: impl Into<String>) -> Self {
        Self {
            http_status,
            content: None,
            error: Some(error.into()),
            stop_reason: None,
            model: None,
            usage: TokenUsage::default(),
            attempts: 1,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.content.is_none()
    }

    /// Output was cut by the token limit rather than finishing naturally.
    pub fn is_truncated(&self) -> bool {
        matches!(self.stop_reason.as_deref(), Some("max_tokens") | Some("length"))
    }
}
