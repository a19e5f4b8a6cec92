use registrar_core::domain::actor::{Actor, Role};
use registrar_core::domain::request::{NewRequest, RequestId, RequestType};
use registrar_core::flows::{Decision, TransitionRequest};
use registrar_db::service::DEFAULT_LIST_LIMIT;

use crate::commands::{application_failure, correlation_id, with_service, CommandResult};

#[derive(Debug, Clone)]
pub struct SubmitArgs {
    pub request_type: String,
    pub requester_id: String,
    pub requester_name: String,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct DecisionArgs {
    pub request_id: String,
    pub actor_id: String,
    pub actor_name: String,
    pub role: String,
    pub comment: Option<String>,
}

pub fn submit(args: SubmitArgs) -> CommandResult {
    let request_type = match args.request_type.parse::<RequestType>() {
        Ok(request_type) => request_type,
        Err(error) => return CommandResult::failure("submit", error.kind(), error.to_string(), 6),
    };
    let request = NewRequest {
        request_type,
        requester_id: args.requester_id,
        requester_name: args.requester_name,
        summary: args.summary,
    };

    with_service("submit", |service| async move {
        match service.submit(request, &correlation_id()).await {
            Ok(record) => CommandResult::success_with_data(
                "submit",
                format!("submitted {} ({})", record.id, record.status),
                &record,
            ),
            Err(error) => application_failure("submit", error),
        }
    })
}

pub fn show(request_id: &str) -> CommandResult {
    let id = RequestId(request_id.to_string());
    with_service("show", |service| async move {
        match service.get(&id).await {
            Ok(record) => CommandResult::success_with_data(
                "show",
                format!("{} is {}", record.id, record.status),
                &record,
            ),
            Err(error) => application_failure("show", error),
        }
    })
}

pub fn pending(role: &str, limit: Option<u32>) -> CommandResult {
    let role = match role.parse::<Role>() {
        Ok(role) => role,
        Err(error) => return CommandResult::failure("pending", error.kind(), error.to_string(), 6),
    };

    with_service("pending", |service| async move {
        match service.actionable_for(role, limit.unwrap_or(DEFAULT_LIST_LIMIT)).await {
            Ok(records) => CommandResult::success_with_data(
                "pending",
                format!("{} request(s) awaiting {role}", records.len()),
                &records,
            ),
            Err(error) => application_failure("pending", error),
        }
    })
}

pub fn submitted(requester_id: &str) -> CommandResult {
    let requester_id = requester_id.to_string();
    with_service("submitted", |service| async move {
        match service.submitted_by(&requester_id).await {
            Ok(records) => CommandResult::success_with_data(
                "submitted",
                format!("{} request(s) submitted by {requester_id}", records.len()),
                &records,
            ),
            Err(error) => application_failure("submitted", error),
        }
    })
}

pub fn dispatch(request_id: &str) -> CommandResult {
    let id = RequestId(request_id.to_string());
    with_service("dispatch", |service| async move {
        match service.dispatch(&id, &correlation_id()).await {
            Ok(outcome) => CommandResult::success_with_data(
                "dispatch",
                format!("{} is now {}", outcome.record.id, outcome.record.status),
                &outcome.record,
            ),
            Err(error) => application_failure("dispatch", error),
        }
    })
}

pub fn approve(args: DecisionArgs) -> CommandResult {
    decide("approve", Decision::Approve, args)
}

pub fn reject(args: DecisionArgs) -> CommandResult {
    decide("reject", Decision::Reject, args)
}

fn decide(command: &'static str, decision: Decision, args: DecisionArgs) -> CommandResult {
    let role = match args.role.parse::<Role>() {
        Ok(role) => role,
        Err(error) => return CommandResult::failure(command, error.kind(), error.to_string(), 6),
    };
    let id = RequestId(args.request_id);
    let request = TransitionRequest {
        decision,
        actor: Actor::new(args.actor_id, args.actor_name, role),
        comment: args.comment,
    };

    with_service(command, |service| async move {
        match service.decide(&id, request, &correlation_id()).await {
            Ok(outcome) => CommandResult::success_with_data(
                command,
                format!(
                    "{} moved from stage {} to {} ({})",
                    outcome.record.id, outcome.from_index, outcome.to_index, outcome.status
                ),
                &outcome.record,
            ),
            Err(error) => application_failure(command, error),
        }
    })
}
