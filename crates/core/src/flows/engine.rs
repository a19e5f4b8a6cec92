use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::approvals::PermissionPolicy;
use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::actor::Role;
use crate::domain::request::{
    ApprovalEntry, DecisionStatus, RequestRecord, RequestStatus, RequestType,
};
use crate::flows::catalog::resolve_required;
use crate::flows::states::{Decision, DispatchOutcome, TransitionOutcome, TransitionRequest};

const DEFAULT_APPROVE_COMMENT: &str = "Approved";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("role `{role}` may not act at stage {stage:?} (requires {required_role:?})")]
    Unauthorized { role: Role, required_role: Option<Role>, stage: Option<String> },
    #[error("request is already finalized as `{status}`")]
    AlreadyFinalized { status: RequestStatus },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unknown request type `{request_type}`")]
    UnknownType { request_type: String },
    #[error("unknown role `{role}`")]
    UnknownRole { role: String },
    #[error("stage index {stage_index} is out of range for `{request_type}` requests")]
    IndexOutOfRange { request_type: RequestType, stage_index: u32 },
    #[error("only submitted requests can be dispatched (current stage index {stage_index})")]
    InvalidDispatch { stage_index: u32 },
}

impl ApprovalError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::AlreadyFinalized { .. } => "already_finalized",
            Self::Validation(_) => "validation",
            Self::UnknownType { .. } => "unknown_type",
            Self::UnknownRole { .. } => "unknown_role",
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::InvalidDispatch { .. } => "invalid_dispatch",
        }
    }
}

/// Applies approval decisions to request records.
///
/// The engine is pure: it never mutates the record it is given and has no
/// I/O. Persisting the returned record (and re-checking the stage index at
/// commit time) is the caller's job.
#[derive(Clone, Debug, Default)]
pub struct StageEngine {
    policy: PermissionPolicy,
}

impl StageEngine {
    pub fn new(policy: PermissionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PermissionPolicy {
        &self.policy
    }

    pub fn apply(
        &self,
        record: &RequestRecord,
        request: &TransitionRequest,
    ) -> Result<TransitionOutcome, ApprovalError> {
        self.apply_at(record, request, Utc::now())
    }

    pub fn apply_at(
        &self,
        record: &RequestRecord,
        request: &TransitionRequest,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, ApprovalError> {
        if record.is_final() {
            return Err(ApprovalError::AlreadyFinalized { status: record.status.clone() });
        }

        let from_index = record.current_stage_index;
        resolve_required(record.request_type, from_index)?;
        let basis = self.policy.authorize(&request.actor, record)?;

        let comment =
            request.comment.as_deref().map(str::trim).filter(|comment| !comment.is_empty());
        let (decision_status, comment) = match request.decision {
            Decision::Approve => {
                (DecisionStatus::Approved, comment.unwrap_or(DEFAULT_APPROVE_COMMENT).to_string())
            }
            Decision::Reject => {
                let Some(comment) = comment else {
                    return Err(ApprovalError::Validation(
                        "a comment is required when rejecting a request".to_string(),
                    ));
                };
                (DecisionStatus::Rejected, comment.to_string())
            }
        };

        let entry = ApprovalEntry {
            approver_role: request.actor.role,
            approver_id: request.actor.id.clone(),
            approver_name: request.actor.name.clone(),
            status: decision_status,
            comment,
            stage_index: from_index,
            approved_at: now,
        };

        let (to_index, status) = match request.decision {
            Decision::Approve => {
                let to_index = from_index + 1;
                let stage = resolve_required(record.request_type, to_index)?;
                let status = if to_index == record.request_type.terminal_index() {
                    RequestStatus::Approved
                } else {
                    RequestStatus::Pending(stage.name.to_string())
                };
                (to_index, status)
            }
            Decision::Reject => (from_index, RequestStatus::Rejected),
        };

        let mut next = record.clone();
        next.approvals.push(entry.clone());
        next.current_stage_index = to_index;
        next.status = status.clone();
        next.updated_at = now;

        Ok(TransitionOutcome {
            from_index,
            to_index,
            decision: request.decision,
            status,
            basis,
            entry,
            record: next,
        })
    }

    /// Moves a freshly submitted request onto its first actionable stage.
    pub fn dispatch(
        &self,
        record: &RequestRecord,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, ApprovalError> {
        if record.is_final() {
            return Err(ApprovalError::AlreadyFinalized { status: record.status.clone() });
        }
        if record.current_stage_index != 0 {
            return Err(ApprovalError::InvalidDispatch {
                stage_index: record.current_stage_index,
            });
        }

        let stage = resolve_required(record.request_type, 1)?;
        let mut next = record.clone();
        next.current_stage_index = 1;
        next.status = RequestStatus::Pending(stage.name.to_string());
        next.updated_at = now;

        Ok(DispatchOutcome { from_index: 0, to_index: 1, record: next })
    }

    pub fn apply_with_audit<S>(
        &self,
        record: &RequestRecord,
        request: &TransitionRequest,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, ApprovalError>
    where
        S: AuditSink,
    {
        let result = self.apply(record, request);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        Some(record.id.clone()),
                        audit.correlation_id.clone(),
                        "approval.transition_applied",
                        AuditCategory::Approval,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", outcome.from_index.to_string())
                    .with_metadata("to", outcome.to_index.to_string())
                    .with_metadata("decision", format!("{:?}", outcome.decision))
                    .with_metadata("status", outcome.status.to_string())
                    .with_metadata("role", request.actor.role.as_str()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        Some(record.id.clone()),
                        audit.correlation_id.clone(),
                        "approval.transition_refused",
                        AuditCategory::Approval,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string())
                    .with_metadata("error_kind", error.kind()),
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::approvals::{AuthorizationBasis, PermissionPolicy};
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::actor::{Actor, Role};
    use crate::domain::request::{
        DecisionStatus, NewRequest, RequestRecord, RequestStatus, RequestType,
    };
    use crate::flows::catalog::resolve;
    use crate::flows::engine::{ApprovalError, StageEngine};
    use crate::flows::states::{Decision, TransitionRequest};

    fn record_at(request_type: RequestType, index: u32) -> RequestRecord {
        let mut record = RequestRecord::submit(
            NewRequest {
                request_type,
                requester_id: "stu-100".to_string(),
                requester_name: "Tunde Ade".to_string(),
                summary: "Missed test due to illness".to_string(),
            },
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        );
        record.current_stage_index = index;
        record.status = RequestStatus::Pending(
            resolve(request_type, index).map(|stage| stage.name).unwrap_or("unknown").to_string(),
        );
        record
    }

    fn actor(role: Role) -> Actor {
        Actor::new(format!("{}-1", role.as_str().to_ascii_lowercase()), "Dr. Okafor", role)
    }

    #[test]
    fn lecturer_approval_advances_excuse_to_hod() {
        let engine = StageEngine::default();
        let record = record_at(RequestType::Excuse, 1);

        let outcome = engine
            .apply(
                &record,
                &TransitionRequest::approve(actor(Role::Lecturer), Some("ok".to_string())),
            )
            .expect("lecturer approves");

        assert_eq!(outcome.record.current_stage_index, 2);
        assert_eq!(outcome.record.status.to_string(), "Pending HOD Approval");
        assert_eq!(outcome.record.approvals.len(), 1);
        assert_eq!(outcome.entry.comment, "ok");
        assert_eq!(outcome.entry.status, DecisionStatus::Approved);
        assert_eq!(outcome.entry.stage_index, 1);
        assert_eq!(outcome.basis, AuthorizationBasis::StageRole);
        assert_eq!(record.current_stage_index, 1, "input record is left untouched");
    }

    #[test]
    fn dean_approval_finalizes_leave() {
        let engine = StageEngine::default();
        let outcome = engine
            .apply(
                &record_at(RequestType::Leave, 3),
                &TransitionRequest::approve(actor(Role::Dean), None),
            )
            .expect("dean approves");

        assert_eq!(outcome.to_index, 4);
        assert_eq!(outcome.record.status, RequestStatus::Approved);
        assert_eq!(outcome.record.status.to_string(), "Approved");
        assert_eq!(outcome.entry.comment, "Approved");
    }

    #[test]
    fn lecturer_cannot_approve_letter_at_staff_stage() {
        let engine = StageEngine::default();
        let record = record_at(RequestType::Letter, 1);

        let error = engine
            .apply(&record, &TransitionRequest::approve(actor(Role::Lecturer), None))
            .expect_err("lecturer is not the staff approver");

        assert_eq!(
            error,
            ApprovalError::Unauthorized {
                role: Role::Lecturer,
                required_role: Some(Role::Staff),
                stage: Some("Pending Staff Approval".to_string()),
            }
        );
        assert_eq!(record.current_stage_index, 1);
        assert!(record.approvals.is_empty());
    }

    #[test]
    fn hod_rejection_keeps_index_and_records_comment() {
        let engine = StageEngine::default();
        let outcome = engine
            .apply(
                &record_at(RequestType::Excuse, 2),
                &TransitionRequest::reject(actor(Role::Hod), "incomplete documents"),
            )
            .expect("hod rejects");

        assert_eq!(outcome.record.status, RequestStatus::Rejected);
        assert_eq!(outcome.record.current_stage_index, 2);
        assert_eq!(outcome.record.approvals.len(), 1);
        assert_eq!(outcome.record.approvals[0].status, DecisionStatus::Rejected);
        assert_eq!(outcome.record.approvals[0].comment, "incomplete documents");
    }

    #[test]
    fn reject_without_comment_is_a_validation_error() {
        let engine = StageEngine::default();
        let record = record_at(RequestType::Leave, 2);

        for comment in [None, Some(String::new()), Some("   ".to_string())] {
            let error = engine
                .apply(
                    &record,
                    &TransitionRequest {
                        decision: Decision::Reject,
                        actor: actor(Role::Hod),
                        comment,
                    },
                )
                .expect_err("comment is mandatory");
            assert!(matches!(error, ApprovalError::Validation(_)));
        }
    }

    #[test]
    fn finalized_records_absorb_every_transition() {
        let engine = StageEngine::new(PermissionPolicy::new(true));

        let mut approved = record_at(RequestType::Leave, 4);
        approved.status = RequestStatus::Approved;
        let mut rejected = record_at(RequestType::Excuse, 3);
        rejected.status = RequestStatus::Rejected;

        for record in [approved, rejected] {
            for role in Role::ALL {
                for request in [
                    TransitionRequest::approve(actor(role), None),
                    TransitionRequest::reject(actor(role), "no"),
                ] {
                    let error = engine.apply(&record, &request).expect_err("finalized");
                    assert_eq!(
                        error,
                        ApprovalError::AlreadyFinalized { status: record.status.clone() }
                    );
                }
            }
        }
    }

    #[test]
    fn corrupt_stage_index_is_reported() {
        let engine = StageEngine::default();
        let mut record = record_at(RequestType::Letter, 1);
        record.current_stage_index = 9;

        let error = engine
            .apply(&record, &TransitionRequest::approve(actor(Role::Staff), None))
            .expect_err("index out of range");

        assert_eq!(
            error,
            ApprovalError::IndexOutOfRange { request_type: RequestType::Letter, stage_index: 9 }
        );
    }

    #[test]
    fn full_excuse_chain_is_monotonic() {
        let engine = StageEngine::default();
        let mut record = engine
            .dispatch(&record_at(RequestType::Excuse, 0), Utc::now())
            .expect("dispatch")
            .record;
        let mut previous = record.current_stage_index;

        for role in [Role::Lecturer, Role::Hod, Role::Dean, Role::Vc] {
            record = engine
                .apply(&record, &TransitionRequest::approve(actor(role), None))
                .expect("chain step")
                .record;
            assert!(record.current_stage_index > previous);
            previous = record.current_stage_index;
        }

        assert_eq!(record.current_stage_index, 5);
        assert_eq!(record.status, RequestStatus::Approved);
        let roles: Vec<Role> = record.approvals.iter().map(|entry| entry.approver_role).collect();
        assert_eq!(roles, vec![Role::Lecturer, Role::Hod, Role::Dean, Role::Vc]);
    }

    #[test]
    fn letter_reaches_terminal_after_staff_approval() {
        let engine = StageEngine::default();
        let outcome = engine
            .apply(
                &record_at(RequestType::Letter, 1),
                &TransitionRequest::approve(actor(Role::Staff), Some("printed".to_string())),
            )
            .expect("staff approves");

        assert_eq!(outcome.to_index, 2);
        assert_eq!(outcome.record.status, RequestStatus::Approved);
        assert_eq!(resolve(RequestType::Letter, 2).map(|stage| stage.name), Some("Ready to Collect"));
    }

    #[test]
    fn dispatch_moves_submission_to_first_approver_without_history() {
        let engine = StageEngine::default();
        let outcome =
            engine.dispatch(&record_at(RequestType::Letter, 0), Utc::now()).expect("dispatch");

        assert_eq!(outcome.to_index, 1);
        assert_eq!(outcome.record.status.to_string(), "Pending Staff Approval");
        assert!(outcome.record.approvals.is_empty());

        let error = engine.dispatch(&outcome.record, Utc::now()).expect_err("already dispatched");
        assert_eq!(error, ApprovalError::InvalidDispatch { stage_index: 1 });
    }

    #[test]
    fn admin_override_records_admin_role_in_history() {
        let engine = StageEngine::new(PermissionPolicy::new(true));
        let outcome = engine
            .apply(
                &record_at(RequestType::Leave, 2),
                &TransitionRequest::approve(actor(Role::Admin), None),
            )
            .expect("admin override");

        assert_eq!(outcome.basis, AuthorizationBasis::AdminOverride);
        assert_eq!(outcome.entry.approver_role, Role::Admin);
        assert_eq!(outcome.record.current_stage_index, 3);
    }

    #[test]
    fn transition_emits_audit_events_for_success_and_refusal() {
        let engine = StageEngine::default();
        let sink = InMemoryAuditSink::default();
        let record = record_at(RequestType::Leave, 1);
        let context = AuditContext::new(Some(record.id.clone()), "req-42", "stage-engine");

        engine
            .apply_with_audit(
                &record,
                &TransitionRequest::approve(actor(Role::Lecturer), None),
                &sink,
                &context,
            )
            .expect("approve");
        let _ = engine.apply_with_audit(
            &record,
            &TransitionRequest::approve(actor(Role::Dean), None),
            &sink,
            &context,
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "approval.transition_applied");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("2"));
        assert_eq!(events[1].event_type, "approval.transition_refused");
        assert_eq!(events[1].metadata.get("error_kind").map(String::as_str), Some("unauthorized"));
        assert_eq!(events[1].correlation_id, "req-42");
    }
}
