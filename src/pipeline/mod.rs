//! Question-answering workflow: state types and the orchestrating state
//! machine that moves one question from routing to a final record.

mod orchestrator;
mod state;

pub use orchestrator::{Orchestrator, Stage};
pub use state::{
    AgentState, Constraint, ConstraintKind, FormatHint, OutputRecord, Question, RouteMode,
    RoutingDecision, SqlAttempt, StageEvent, ValidationResult,
};
