pub mod catalog;
pub mod engine;
pub mod states;

pub use catalog::{resolve, resolve_required, stages_for, StageDescriptor};
pub use engine::{ApprovalError, StageEngine};
pub use states::{Decision, DispatchOutcome, TransitionOutcome, TransitionRequest};
