use thiserror::Error;

use crate::flows::states::{FlowAction, FlowEvent, FlowState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: FlowState,
        event: FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Linear case pipeline: Received → Validated → PromptBuilt → GatewayCalled →
/// ShapingDone → Responded, with Errored reachable from any non-terminal state.
#[derive(Clone, Debug, Default)]
pub struct CaseRequestFlow;

impl FlowDefinition for CaseRequestFlow {
    fn initial_state(&self) -> FlowState {
        FlowState::Received
    }

    fn transition(
        &self,
        current: FlowState,
        event: FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_case_request(current, event)
    }
}

#[derive(Clone, Debug)]
pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: FlowState,
        event: FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }
}

impl Default for FlowEngine<CaseRequestFlow> {
    fn default() -> Self {
        Self::new(CaseRequestFlow)
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("request already reached terminal state {state:?}; event {event:?} rejected")]
    AlreadyTerminal { state: FlowState, event: FlowEvent },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

/// Tracks a single request's walk through the flow.
#[derive(Clone, Debug)]
pub struct FlowTracker<F = CaseRequestFlow> {
    engine: FlowEngine<F>,
    state: FlowState,
    visited: Vec<FlowState>,
    actions: Vec<FlowAction>,
}

impl FlowTracker<CaseRequestFlow> {
    pub fn case_request() -> Self {
        Self::new(FlowEngine::default())
    }
}

impl<F> FlowTracker<F>
where
    F: FlowDefinition,
{
    pub fn new(engine: FlowEngine<F>) -> Self {
        let state = engine.initial_state();
        Self { engine, state, visited: vec![state], actions: Vec::new() }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn visited(&self) -> &[FlowState] {
        &self.visited
    }

    /// Actions requested by every transition so far, in order.
    pub fn actions(&self) -> &[FlowAction] {
        &self.actions
    }

    pub fn advance(&mut self, event: FlowEvent) -> Result<TransitionOutcome, FlowTransitionError> {
        let outcome = self.engine.apply(self.state, event)?;
        self.state = outcome.to;
        self.visited.push(outcome.to);
        self.actions.extend_from_slice(&outcome.actions);
        Ok(outcome)
    }

    /// Moves to `Errored` unless the request is already terminal.
    pub fn fail(&mut self) -> Option<TransitionOutcome> {
        self.advance(FlowEvent::Failed).ok()
    }

    pub fn into_parts(self) -> (Vec<FlowState>, Vec<FlowAction>) {
        (self.visited, self.actions)
    }
}

fn transition_case_request(
    current: FlowState,
    event: FlowEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{BuildPrompt, CallGateway, SendError, SendResult, ShapeResponse};
    use FlowEvent::{
        Failed, GatewayCompleted, InputValidated, PromptRendered, ResponseSent, ResultShaped,
    };
    use FlowState::{
        Errored, GatewayCalled, PromptBuilt, Received, Responded, ShapingDone, Validated,
    };

    if current.is_terminal() {
        return Err(FlowTransitionError::AlreadyTerminal { state: current, event });
    }

    let (to, actions) = match (current, event) {
        (Received, InputValidated) => (Validated, vec![BuildPrompt]),
        (Validated, PromptRendered) => (PromptBuilt, vec![CallGateway]),
        (PromptBuilt, GatewayCompleted) => (GatewayCalled, vec![ShapeResponse]),
        (GatewayCalled, ResultShaped) => (ShapingDone, vec![SendResult]),
        (ShapingDone, ResponseSent) => (Responded, Vec::new()),
        (_, Failed) => (Errored, vec![SendError]),
        _ => return Err(FlowTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}
