use std::fmt;

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid case request: `{field}` {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self { field: field.into(), reason: "is required and must not be empty".to_string() }
    }

    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ShapingError {
    #[error("upstream reported failure: {0}")]
    UpstreamFailure(String),
    #[error("upstream response carried no text content")]
    MissingContent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransientCause {
    Timeout,
    Network,
    RateLimited,
    Upstream(u16),
}

impl fmt::Display for TransientCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Network => write!(f, "network error"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::Upstream(status) => write!(f, "upstream status {status}"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("transient gateway failure after {attempts} attempt(s): {cause}")]
    Transient { cause: TransientCause, attempts: u32, detail: String },
    #[error("upstream rejected the api credential (status {status})")]
    Auth { status: u16 },
    #[error("upstream rejected the request (status {status}): {detail}")]
    RequestRejected { status: u16, detail: String },
    #[error("gateway call was cancelled")]
    Cancelled,
    #[error("gateway client failure: {0}")]
    Client(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Stable, machine-readable error classes exposed to API clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub enum ErrorKind {
    ConfigurationError,
    ValidationError,
    AuthError,
    RequestRejectedError,
    TransientGatewayError,
    ShapingError,
    Cancelled,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "ConfigurationError",
            Self::ValidationError => "ValidationError",
            Self::AuthError => "AuthError",
            Self::RequestRejectedError => "RequestRejectedError",
            Self::TransientGatewayError => "TransientGatewayError",
            Self::ShapingError => "ShapingError",
            Self::Cancelled => "Cancelled",
            Self::InternalError => "InternalError",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Shaping(#[from] ShapingError),
    #[error(transparent)]
    Flow(#[from] FlowTransitionError),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Gateway(GatewayError::Auth { .. }) => ErrorKind::AuthError,
            Self::Gateway(GatewayError::RequestRejected { .. }) => ErrorKind::RequestRejectedError,
            Self::Gateway(GatewayError::Transient { .. }) => ErrorKind::TransientGatewayError,
            Self::Gateway(GatewayError::Cancelled) => ErrorKind::Cancelled,
            Self::Gateway(GatewayError::Client(_)) | Self::Flow(_) | Self::Internal(_) => {
                ErrorKind::InternalError
            }
            Self::Shaping(_) => ErrorKind::ShapingError,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Gateway(GatewayError::Transient { cause: TransientCause::Timeout, .. })
        )
    }

    /// Field named by a validation failure, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation(error) => Some(error.field.as_str()),
            _ => None,
        }
    }

    /// Message safe to return to API clients. Never includes upstream bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(error) => error.to_string(),
            Self::Gateway(GatewayError::Auth { .. }) => {
                "The language model service rejected the configured credential.".to_string()
            }
            Self::Gateway(GatewayError::RequestRejected { .. }) => {
                "The language model service rejected the derived request.".to_string()
            }
            Self::Gateway(GatewayError::Transient { attempts, .. }) => {
                if self.is_timeout() {
                    format!("The language model service timed out after {attempts} attempt(s).")
                } else {
                    format!(
                        "The language model service is temporarily unavailable after {attempts} attempt(s). Please retry shortly."
                    )
                }
            }
            Self::Gateway(GatewayError::Cancelled) => "The request was cancelled.".to_string(),
            Self::Shaping(_) => {
                "The language model service returned an unusable response.".to_string()
            }
            Self::Gateway(GatewayError::Client(_)) | Self::Flow(_) | Self::Internal(_) => {
                "An unexpected internal error occurred.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{
        ErrorKind, GatewayError, PipelineError, ShapingError, TransientCause, ValidationError,
    };

    #[test]
    fn validation_error_names_the_field() {
        let error = PipelineError::from(ValidationError::missing("description"));

        assert_eq!(error.kind(), ErrorKind::ValidationError);
        assert_eq!(error.field(), Some("description"));
        assert!(error.user_message().contains("description"));
    }

    #[test]
    fn gateway_errors_map_to_distinct_kinds() {
        let auth = PipelineError::from(GatewayError::Auth { status: 401 });
        let rejected = PipelineError::from(GatewayError::RequestRejected {
            status: 400,
            detail: "bad".to_string(),
        });
        let transient = PipelineError::from(GatewayError::Transient {
            cause: TransientCause::Upstream(503),
            attempts: 3,
            detail: "overloaded".to_string(),
        });

        assert_eq!(auth.kind(), ErrorKind::AuthError);
        assert_eq!(rejected.kind(), ErrorKind::RequestRejectedError);
        assert_eq!(transient.kind(), ErrorKind::TransientGatewayError);
        assert!(!transient.is_timeout());
    }

    #[test]
    fn timeouts_are_flagged() {
        let error = PipelineError::from(GatewayError::Transient {
            cause: TransientCause::Timeout,
            attempts: 2,
            detail: "operation timed out".to_string(),
        });

        assert!(error.is_timeout());
        assert!(error.user_message().contains("timed out after 2 attempt(s)"));
    }

    #[test]
    fn user_messages_do_not_echo_upstream_detail() {
        let error = PipelineError::from(GatewayError::RequestRejected {
            status: 400,
            detail: "secret upstream body sk-live-123".to_string(),
        });
        assert!(!error.user_message().contains("sk-live-123"));

        let shaping = PipelineError::from(ShapingError::UpstreamFailure("overloaded".to_string()));
        assert_eq!(shaping.kind(), ErrorKind::ShapingError);
        assert!(!shaping.user_message().contains("overloaded"));
    }
}
