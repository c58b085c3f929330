use serde::{Deserialize, Serialize};

/// Per-request pipeline position. `Responded` and `Errored` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Received,
    Validated,
    PromptBuilt,
    GatewayCalled,
    ShapingDone,
    Responded,
    Errored,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Responded | Self::Errored)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::PromptBuilt => "prompt_built",
            Self::GatewayCalled => "gateway_called",
            Self::ShapingDone => "shaping_done",
            Self::Responded => "responded",
            Self::Errored => "errored",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    InputValidated,
    PromptRendered,
    GatewayCompleted,
    ResultShaped,
    ResponseSent,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    BuildPrompt,
    CallGateway,
    ShapeResponse,
    SendResult,
    SendError,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
