pub mod engine;
pub mod states;

pub use engine::{TransitionEngine, TransitionError};
pub use states::{ApprovalAction, Checkpoint, TransitionContext, TransitionOutcome};
