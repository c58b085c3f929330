pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod prompt;
pub mod shaping;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};
pub use credentials::{redact_key, CredentialStore};
pub use domain::case::{AccountInfo, CaseRequest, CaseResult, InteractionEntry, ResultMetadata};
pub use domain::gateway::{GatewayRequest, GatewayResponse, TokenUsage};
pub use errors::{
    ErrorKind, GatewayError, PipelineError, ShapingError, TransientCause, ValidationError,
};
pub use flows::{FlowEvent, FlowState, FlowTracker};
pub use prompt::{PromptBuilder, PromptDocument};
pub use shaping::{ShapeContext, ShapeOutcome};
