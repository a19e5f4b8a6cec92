pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use approvals::{can_act, AuthorizationBasis, PermissionPolicy};
pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::actor::{Actor, Role};
pub use domain::request::{
    ApprovalEntry, DecisionStatus, NewRequest, RequestId, RequestRecord, RequestStatus,
    RequestType,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{
    resolve, resolve_required, stages_for, ApprovalError, Decision, DispatchOutcome,
    StageDescriptor, StageEngine, TransitionOutcome, TransitionRequest,
};
