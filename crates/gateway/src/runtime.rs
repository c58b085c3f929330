use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use caserelay_core::config::AppConfig;
use caserelay_core::credentials::CredentialStore;
use caserelay_core::domain::case::{CaseRequest, CaseResult};
use caserelay_core::domain::gateway::GatewayRequest;
use caserelay_core::errors::PipelineError;
use caserelay_core::flows::{FlowAction, FlowEvent, FlowState, FlowTracker};
use caserelay_core::prompt::{validate_case, PromptBuilder};
use caserelay_core::shaping::{shape, ShapeContext};

use crate::cancel::CancelSignal;
use crate::GatewayClient;

/// Per-request pipeline. Shared read-only across requests.
#[derive(Clone)]
pub struct CaseRuntime {
    gateway: Arc<dyn GatewayClient>,
    credentials: Arc<CredentialStore>,
    builder: PromptBuilder,
    model: String,
    max_tokens: u32,
}

#[derive(Debug)]
pub struct PipelineRun {
    pub result: Result<CaseResult, PipelineError>,
    pub states: Vec<FlowState>,
    /// Follow-up actions the flow requested along the way.
    pub actions: Vec<FlowAction>,
}

impl CaseRuntime {
    pub fn new(
        gateway: Arc<dyn GatewayClient>,
        credentials: Arc<CredentialStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            gateway,
            credentials,
            builder: PromptBuilder::new(config.prompt.clone()),
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn prompt_builder(&self) -> &PromptBuilder {
        &self.builder
    }

    pub async fn process(
        &self,
        case: &CaseRequest,
        correlation_id: &str,
        cancel: CancelSignal,
    ) -> Result<CaseResult, PipelineError> {
        self.process_traced(case, correlation_id, cancel).await.result
    }

    /// Runs the pipeline and returns the visited flow states alongside the result.
    pub async fn process_traced(
        &self,
        case: &CaseRequest,
        correlation_id: &str,
        cancel: CancelSignal,
    ) -> PipelineRun {
        let mut tracker = FlowTracker::case_request();
        info!(event_name = "case.pipeline.received", correlation_id, "case received");

        let mut result = self.run(case, correlation_id, cancel, &mut tracker).await;
        if result.is_ok() {
            if let Err(error) = advance(&mut tracker, FlowEvent::ResponseSent, correlation_id) {
                result = Err(error);
            }
        }

        match &result {
            Ok(case_result) => info!(
                event_name = "case.pipeline.completed",
                correlation_id,
                attempts = case_result.metadata.attempts,
                shape_degraded = case_result.shape_degraded,
                truncated = case_result.error.is_some(),
                "case analysed"
            ),
            Err(error) => {
                if let Some(outcome) = tracker.fail() {
                    debug!(
                        event_name = "case.flow.transition",
                        correlation_id,
                        from = outcome.from.as_str(),
                        to = outcome.to.as_str(),
                        actions = ?outcome.actions,
                        "flow transition"
                    );
                }
                warn!(
                    event_name = "case.pipeline.failed",
                    correlation_id,
                    error_kind = error.kind().as_str(),
                    error = %error,
                    "case analysis failed"
                );
            }
        }

        let (states, actions) = tracker.into_parts();
        PipelineRun { result, states, actions }
    }

    async fn run(
        &self,
        case: &CaseRequest,
        correlation_id: &str,
        cancel: CancelSignal,
        tracker: &mut FlowTracker,
    ) -> Result<CaseResult, PipelineError> {
        let validated = validate_case(case)?;
        advance(tracker, FlowEvent::InputValidated, correlation_id)?;

        let prompt = self.builder.build(case)?;
        let prompt_fingerprint = prompt.fingerprint().to_string();
        info!(
            event_name = "case.prompt.built",
            correlation_id,
            prompt_fingerprint = %prompt_fingerprint,
            prompt_chars = prompt.user().chars().count(),
            "prompt rendered"
        );
        advance(tracker, FlowEvent::PromptRendered, correlation_id)?;

        let request = GatewayRequest {
            prompt,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            api_key: self.credentials.api_key().clone(),
        };
        let response = self
            .gateway
            .call(request, cancel)
            .instrument(info_span!("gateway_call", correlation_id))
            .await?;
        info!(
            event_name = "case.gateway.completed",
            correlation_id,
            http_status = response.http_status,
            attempts = response.attempts,
            "gateway call completed"
        );
        advance(tracker, FlowEvent::GatewayCompleted, correlation_id)?;

        let context = ShapeContext {
            customer_id: validated.customer_id,
            correlation_id,
            prompt_fingerprint: &prompt_fingerprint,
        };
        let result = shape(response, &context)?;
        advance(tracker, FlowEvent::ResultShaped, correlation_id)?;

        Ok(result)
    }
}

fn advance(
    tracker: &mut FlowTracker,
    event: FlowEvent,
    correlation_id: &str,
) -> Result<(), PipelineError> {
    let outcome = tracker.advance(event)?;
    debug!(
        event_name = "case.flow.transition",
        correlation_id,
        from = outcome.from.as_str(),
        to = outcome.to.as_str(),
        actions = ?outcome.actions,
        "flow transition"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use caserelay_core::config::AppConfig;
    use caserelay_core::credentials::CredentialStore;
    use caserelay_core::domain::case::CaseRequest;
    use caserelay_core::domain::gateway::{GatewayRequest, GatewayResponse};
    use caserelay_core::errors::{ErrorKind, GatewayError, TransientCause};
    use caserelay_core::flows::{FlowAction, FlowState};
    use secrecy::{ExposeSecret, SecretString};

    use super::CaseRuntime;
    use crate::cancel::CancelSignal;
    use crate::GatewayClient;

    const TEST_KEY: &str = "sk-runtime-test-0001";

    struct CountingGateway {
        reply: Result<GatewayResponse, GatewayError>,
        calls: AtomicUsize,
        last_request: Mutex<Option<GatewayRequest>>,
    }

    impl CountingGateway {
        fn replying(reply: Result<GatewayResponse, GatewayError>) -> Arc<Self> {
            Arc::new(Self { reply, calls: AtomicUsize::new(0), last_request: Mutex::new(None) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GatewayClient for CountingGateway {
        async fn call(
            &self,
            request: GatewayRequest,
            _cancel: CancelSignal,
        ) -> Result<GatewayResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().expect("request lock") = Some(request);
            self.reply.clone()
        }
    }

    fn runtime(gateway: Arc<CountingGateway>) -> CaseRuntime {
        let credentials = CredentialStore::new(SecretString::from(TEST_KEY.to_string()))
            .expect("credential store");
        CaseRuntime::new(gateway, Arc::new(credentials), &AppConfig::default())
    }

    fn case(description: Option<&str>) -> CaseRequest {
        CaseRequest {
            customer_id: Some("C-1".to_string()),
            description: description.map(str::to_string),
            ..CaseRequest::default()
        }
    }

    #[tokio::test]
    async fn structured_reply_walks_every_state() {
        let gateway = CountingGateway::replying(Ok(GatewayResponse::text(
            200,
            "Summary: billing dispute. Action: refund review.",
        )));
        let runtime = runtime(gateway.clone());

        let run = runtime
            .process_traced(&case(Some("Billing dispute")), "req-1", CancelSignal::never())
            .await;
        let result = run.result.expect("pipeline succeeds");

        assert_eq!(result.summary.as_deref(), Some("billing dispute"));
        assert_eq!(result.recommendation.as_deref(), Some("refund review"));
        assert_eq!(result.metadata.correlation_id, "req-1");
        assert_eq!(gateway.calls(), 1);
        assert_eq!(
            run.states,
            vec![
                FlowState::Received,
                FlowState::Validated,
                FlowState::PromptBuilt,
                FlowState::GatewayCalled,
                FlowState::ShapingDone,
                FlowState::Responded,
            ]
        );
        assert_eq!(
            run.actions,
            vec![
                FlowAction::BuildPrompt,
                FlowAction::CallGateway,
                FlowAction::ShapeResponse,
                FlowAction::SendResult,
            ]
        );
    }

    #[tokio::test]
    async fn outbound_request_carries_credential_model_and_prompt() {
        let gateway = CountingGateway::replying(Ok(GatewayResponse::text(200, "free text")));
        let runtime = runtime(gateway.clone());

        let result = runtime
            .process(&case(Some("Billing dispute")), "req-2", CancelSignal::never())
            .await
            .expect("degraded result is still a success");
        assert!(result.shape_degraded);

        let request = gateway
            .last_request
            .lock()
            .expect("request lock")
            .clone()
            .expect("gateway saw a request");
        assert_eq!(request.api_key.expose_secret(), TEST_KEY);
        assert_eq!(request.model, AppConfig::default().llm.model);
        assert_eq!(request.max_tokens, 1000);
        assert!(request.prompt.user().contains("Billing dispute"));
        assert_eq!(request.prompt.fingerprint(), result.metadata.prompt_fingerprint);
    }

    #[tokio::test]
    async fn validation_failure_never_calls_gateway() {
        let gateway = CountingGateway::replying(Ok(GatewayResponse::text(200, "unused")));
        let runtime = runtime(gateway.clone());

        let run = runtime.process_traced(&case(None), "req-3", CancelSignal::never()).await;
        let error = run.result.expect_err("description is required");

        assert_eq!(error.kind(), ErrorKind::ValidationError);
        assert_eq!(error.field(), Some("description"));
        assert_eq!(gateway.calls(), 0);
        assert_eq!(run.states, vec![FlowState::Received, FlowState::Errored]);
        assert_eq!(run.actions, vec![FlowAction::SendError]);
    }

    #[tokio::test]
    async fn gateway_failure_is_propagated() {
        let gateway = CountingGateway::replying(Err(GatewayError::Transient {
            cause: TransientCause::Timeout,
            attempts: 3,
            detail: "timed out".to_string(),
        }));
        let runtime = runtime(gateway);

        let run = runtime
            .process_traced(&case(Some("Billing dispute")), "req-4", CancelSignal::never())
            .await;
        let error = run.result.expect_err("gateway failed");

        assert_eq!(error.kind(), ErrorKind::TransientGatewayError);
        assert!(error.is_timeout());
        assert_eq!(
            run.states,
            vec![
                FlowState::Received,
                FlowState::Validated,
                FlowState::PromptBuilt,
                FlowState::Errored,
            ]
        );
    }

    #[tokio::test]
    async fn failed_upstream_payload_is_a_shaping_error() {
        let gateway =
            CountingGateway::replying(Ok(GatewayResponse::failed(200, "overloaded_error")));
        let runtime = runtime(gateway);

        let run = runtime
            .process_traced(&case(Some("Billing dispute")), "req-5", CancelSignal::never())
            .await;

        assert_eq!(run.result.expect_err("unusable").kind(), ErrorKind::ShapingError);
        assert_eq!(run.states.last(), Some(&FlowState::Errored));
        assert!(run.states.contains(&FlowState::GatewayCalled));
    }
}
