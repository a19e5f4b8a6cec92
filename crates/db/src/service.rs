use chrono::Utc;
use tracing::{info, warn};

use registrar_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use registrar_core::domain::actor::Role;
use registrar_core::domain::request::{NewRequest, RequestId, RequestRecord};
use registrar_core::errors::ApplicationError;
use registrar_core::flows::{
    ApprovalError, DispatchOutcome, StageEngine, TransitionOutcome, TransitionRequest,
};

use crate::repositories::{RepositoryError, RequestRepository};

pub const DEFAULT_LIST_LIMIT: u32 = 200;

/// Loads, decides and commits approval transitions against a repository.
pub struct ApprovalService<R, S> {
    repository: R,
    engine: StageEngine,
    sink: S,
    auto_dispatch: bool,
}

impl<R, S> ApprovalService<R, S>
where
    R: RequestRepository,
    S: AuditSink,
{
    pub fn new(repository: R, engine: StageEngine, sink: S, auto_dispatch: bool) -> Self {
        Self { repository, engine, sink, auto_dispatch }
    }

    pub fn engine(&self) -> &StageEngine {
        &self.engine
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn submit(
        &self,
        request: NewRequest,
        correlation_id: &str,
    ) -> Result<RequestRecord, ApplicationError> {
        for (field, value) in [
            ("requester_id", &request.requester_id),
            ("requester_name", &request.requester_name),
            ("summary", &request.summary),
        ] {
            if value.trim().is_empty() {
                return Err(ApprovalError::Validation(format!("`{field}` must not be empty")).into());
            }
        }

        let requester = request.requester_id.clone();
        let now = Utc::now();
        let mut record = RequestRecord::submit(request, now);
        if self.auto_dispatch {
            record = self.engine.dispatch(&record, now)?.record;
        }

        self.repository.create(record.clone()).await?;
        info!(
            event_name = "request.submitted",
            correlation_id = %correlation_id,
            request_id = %record.id,
            request_type = %record.request_type,
            stage_index = record.current_stage_index,
            "request submitted"
        );
        self.sink.emit(
            AuditEvent::new(
                Some(record.id.clone()),
                correlation_id,
                "request.submitted",
                AuditCategory::Ingress,
                requester,
                AuditOutcome::Success,
            )
            .with_metadata("request_type", record.request_type.as_str())
            .with_metadata("status", record.status.to_string()),
        );

        Ok(record)
    }

    pub async fn get(&self, id: &RequestId) -> Result<RequestRecord, ApplicationError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(id.0.clone()))
    }

    /// Applies an approve or reject decision and commits it only if nobody
    /// moved the request in the meantime.
    pub async fn decide(
        &self,
        id: &RequestId,
        request: TransitionRequest,
        correlation_id: &str,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let record = self.get(id).await?;
        let audit = AuditContext::new(Some(id.clone()), correlation_id, request.actor.id.clone());
        let outcome = self.engine.apply_with_audit(&record, &request, &self.sink, &audit)?;

        self.commit(outcome.record.clone(), outcome.from_index, &audit).await?;
        info!(
            event_name = "approval.committed",
            correlation_id = %correlation_id,
            request_id = %id,
            from = outcome.from_index,
            to = outcome.to_index,
            status = %outcome.status,
            "approval decision committed"
        );
        Ok(outcome)
    }

    pub async fn dispatch(
        &self,
        id: &RequestId,
        correlation_id: &str,
    ) -> Result<DispatchOutcome, ApplicationError> {
        let record = self.get(id).await?;
        let outcome = self.engine.dispatch(&record, Utc::now())?;
        let audit = AuditContext::new(Some(id.clone()), correlation_id, "system");

        self.commit(outcome.record.clone(), outcome.from_index, &audit).await?;
        self.sink.emit(
            AuditEvent::new(
                Some(id.clone()),
                correlation_id,
                "request.dispatched",
                AuditCategory::Approval,
                "system",
                AuditOutcome::Success,
            )
            .with_metadata("status", outcome.record.status.to_string()),
        );
        Ok(outcome)
    }

    /// Open requests the given role could act on right now.
    pub async fn actionable_for(
        &self,
        role: Role,
        limit: u32,
    ) -> Result<Vec<RequestRecord>, ApplicationError> {
        let policy = self.engine.policy();
        let open = self.repository.list_open(limit).await?;
        Ok(open
            .into_iter()
            .filter(|record| {
                policy
                    .eligible_roles(record.request_type, record.current_stage_index)
                    .contains(&role)
            })
            .collect())
    }

    pub async fn submitted_by(
        &self,
        requester_id: &str,
    ) -> Result<Vec<RequestRecord>, ApplicationError> {
        Ok(self.repository.list_by_requester(requester_id).await?)
    }

    async fn commit(
        &self,
        record: RequestRecord,
        expected_stage_index: u32,
        audit: &AuditContext,
    ) -> Result<(), ApplicationError> {
        match self.repository.commit_transition(record, expected_stage_index).await {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!(
                    event_name = "approval.commit_failed",
                    correlation_id = %audit.correlation_id,
                    error = %error,
                    "failed to commit request transition"
                );
                let outcome = match error {
                    RepositoryError::Conflict { .. } => AuditOutcome::Rejected,
                    _ => AuditOutcome::Failed,
                };
                self.sink.emit(
                    AuditEvent::new(
                        audit.request_id.clone(),
                        audit.correlation_id.clone(),
                        "request.commit_failed",
                        AuditCategory::Persistence,
                        audit.actor.clone(),
                        outcome,
                    )
                    .with_metadata("error", error.to_string()),
                );
                Err(error.into())
            }
        }
    }
}
