use serde::{Deserialize, Serialize};

use crate::approvals::AuthorizationBasis;
use crate::domain::actor::Actor;
use crate::domain::request::{ApprovalEntry, RequestRecord, RequestStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub decision: Decision,
    pub actor: Actor,
    pub comment: Option<String>,
}

impl TransitionRequest {
    pub fn approve(actor: Actor, comment: Option<String>) -> Self {
        Self { decision: Decision::Approve, actor, comment }
    }

    pub fn reject(actor: Actor, comment: impl Into<String>) -> Self {
        Self { decision: Decision::Reject, actor, comment: Some(comment.into()) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from_index: u32,
    pub to_index: u32,
    pub decision: Decision,
    pub status: RequestStatus,
    pub basis: AuthorizationBasis,
    pub entry: ApprovalEntry,
    pub record: RequestRecord,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub from_index: u32,
    pub to_index: u32,
    pub record: RequestRecord,
}
