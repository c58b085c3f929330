pub mod engine;
pub mod states;

pub use engine::{CaseRequestFlow, FlowDefinition, FlowEngine, FlowTracker, FlowTransitionError};
pub use states::{FlowAction, FlowEvent, FlowState, TransitionOutcome};
