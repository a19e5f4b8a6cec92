use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use registrar_core::approvals::AuthorizationBasis;
use registrar_core::domain::actor::{Actor, Role};
use registrar_core::domain::request::{NewRequest, RequestId, RequestRecord, RequestStatus, RequestType};
use registrar_core::errors::{ApplicationError, InterfaceError};
use registrar_core::flows::{ApprovalError, Decision, TransitionOutcome, TransitionRequest};
use registrar_db::service::DEFAULT_LIST_LIMIT;

use crate::bootstrap::SharedService;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct RequestsState {
    service: SharedService,
}

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/api/v1/catalog/{request_type}", get(catalog))
        .route("/api/v1/requests", post(create_request).get(list_requests))
        .route("/api/v1/requests/{id}", get(get_request))
        .route("/api/v1/requests/{id}/approve", post(approve))
        .route("/api/v1/requests/{id}/reject", post(reject))
        .route("/api/v1/requests/{id}/dispatch", post(dispatch))
        .with_state(RequestsState { service })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    error: InterfaceError,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub correlation_id: String,
}

impl ApiError {
    fn new(error: ApplicationError, correlation_id: &str) -> Self {
        let code = error.code();
        warn!(
            event_name = "api.request_failed",
            correlation_id = %correlation_id,
            code = code,
            error = %error,
            "request refused"
        );
        Self { code, error: error.into_interface(correlation_id) }
    }

    pub fn status(&self) -> StatusCode {
        match self.error {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        // Storage and configuration details stay in the logs.
        let error = match self.error {
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
                self.error.user_message().to_string()
            }
            _ => self.error.message().to_string(),
        };
        ErrorBody {
            error,
            code: self.code,
            correlation_id: self.error.correlation_id().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("http-{}", uuid::Uuid::new_v4()))
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitBody {
    pub request_type: String,
    pub requester_id: String,
    pub requester_name: String,
    pub summary: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ActorBody {
    pub id: String,
    pub name: String,
    pub role: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DecisionBody {
    pub actor: ActorBody,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListQuery {
    pub role: Option<String>,
    pub requester_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStage {
    pub index: u32,
    pub key: &'static str,
    pub name: &'static str,
    pub approver_role: Option<Role>,
    pub terminal: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub request_type: RequestType,
    pub terminal_index: u32,
    pub stages: Vec<CatalogStage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub from_index: u32,
    pub to_index: u32,
    pub decision: Decision,
    pub status: RequestStatus,
    pub basis: AuthorizationBasis,
    pub record: RequestRecord,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            from_index: outcome.from_index,
            to_index: outcome.to_index,
            decision: outcome.decision,
            status: outcome.status,
            basis: outcome.basis,
            record: outcome.record,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn catalog(
    headers: HeaderMap,
    Path(request_type): Path<String>,
) -> Result<Json<CatalogResponse>, ApiError> {
    let request_type = request_type
        .parse::<RequestType>()
        .map_err(|error| ApiError::new(error.into(), &correlation_id(&headers)))?;

    let terminal_index = request_type.terminal_index();
    let stages = request_type
        .stages()
        .iter()
        .zip(0u32..)
        .map(|(stage, index)| CatalogStage {
            index,
            key: stage.key,
            name: stage.name,
            approver_role: stage.approver_role,
            terminal: index == terminal_index,
        })
        .collect();

    Ok(Json(CatalogResponse { request_type, terminal_index, stages }))
}

pub async fn create_request(
    State(state): State<RequestsState>,
    headers: HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<RequestRecord>), ApiError> {
    let correlation_id = correlation_id(&headers);
    let request_type = body
        .request_type
        .parse::<RequestType>()
        .map_err(|error| ApiError::new(error.into(), &correlation_id))?;

    let record = state
        .service
        .submit(
            NewRequest {
                request_type,
                requester_id: body.requester_id,
                requester_name: body.requester_name,
                summary: body.summary,
            },
            &correlation_id,
        )
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_request(
    State(state): State<RequestsState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<RequestRecord>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let record = state
        .service
        .get(&RequestId(id))
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok(Json(record))
}

pub async fn list_requests(
    State(state): State<RequestsState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RequestRecord>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let fail = |error: ApplicationError| ApiError::new(error, &correlation_id);

    let records = match (query.role, query.requester_id) {
        (Some(role), None) => {
            let role = role.parse::<Role>().map_err(|error| fail(error.into()))?;
            let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
            state.service.actionable_for(role, limit).await.map_err(fail)?
        }
        (None, Some(requester_id)) => {
            state.service.submitted_by(&requester_id).await.map_err(fail)?
        }
        _ => {
            return Err(fail(
                ApprovalError::Validation(
                    "exactly one of `role` or `requester_id` must be given".to_string(),
                )
                .into(),
            ));
        }
    };

    Ok(Json(records))
}

pub async fn approve(
    State(state): State<RequestsState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<TransitionResponse>, ApiError> {
    decide(state, headers, id, Decision::Approve, body).await
}

pub async fn reject(
    State(state): State<RequestsState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<TransitionResponse>, ApiError> {
    decide(state, headers, id, Decision::Reject, body).await
}

pub async fn dispatch(
    State(state): State<RequestsState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<RequestRecord>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let outcome = state
        .service
        .dispatch(&RequestId(id), &correlation_id)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok(Json(outcome.record))
}

async fn decide(
    state: RequestsState,
    headers: HeaderMap,
    id: String,
    decision: Decision,
    body: DecisionBody,
) -> Result<Json<TransitionResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let role = body
        .actor
        .role
        .parse::<Role>()
        .map_err(|error| ApiError::new(error.into(), &correlation_id))?;

    let request = TransitionRequest {
        decision,
        actor: Actor::new(body.actor.id, body.actor.name, role),
        comment: body.comment,
    };
    let outcome = state
        .service
        .decide(&RequestId(id), request, &correlation_id)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;

    info!(
        event_name = "api.decision_recorded",
        correlation_id = %correlation_id,
        request_id = %outcome.record.id,
        status = %outcome.status,
        "decision recorded"
    );
    Ok(Json(outcome.into()))
}
