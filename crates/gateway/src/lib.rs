//! LLM gateway and case pipeline runtime.
//!
//! The gateway is the only component that performs network I/O. It turns a
//! [`GatewayRequest`] into a [`GatewayResponse`], retrying transient upstream
//! failures and honouring cancellation. [`runtime::CaseRuntime`] drives a
//! single case through validation, prompt building, the gateway call and
//! response shaping.
//!
//! # Key Types
//!
//! - `GatewayClient` - seam between the pipeline and the hosted model API
//! - `HttpGateway` - reqwest implementation for Anthropic and OpenAI-compatible APIs
//! - `CancelHandle` / `CancelSignal` - per-request cancellation
//! - `CaseRuntime` - the per-request pipeline

pub mod cancel;
pub mod client;
pub mod retry;
pub mod runtime;

use async_trait::async_trait;
use caserelay_core::domain::gateway::{GatewayRequest, GatewayResponse};
use caserelay_core::errors::GatewayError;

pub use cancel::{cancel_pair, CancelGuard, CancelHandle, CancelSignal};
pub use client::HttpGateway;
pub use retry::RetryPolicy;
pub use runtime::{CaseRuntime, PipelineRun};

#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn call(
        &self,
        request: GatewayRequest,
        cancel: CancelSignal,
    ) -> Result<GatewayResponse, GatewayError>;
}
