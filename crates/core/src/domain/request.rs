use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::Role;
use crate::flows::ApprovalError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("REQ-{}", Uuid::new_v4()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Excuse,
    Leave,
    Letter,
}

impl RequestType {
    pub const ALL: [RequestType; 3] = [Self::Excuse, Self::Leave, Self::Letter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excuse => "excuse",
            Self::Leave => "leave",
            Self::Letter => "letter",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = ApprovalError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "excuse" => Ok(Self::Excuse),
            "leave" => Ok(Self::Leave),
            "letter" => Ok(Self::Letter),
            _ => Err(ApprovalError::UnknownType { request_type: value.to_string() }),
        }
    }
}

/// Where a request sits. Serialized as its display label, so a pending
/// request reads as the name of its current stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RequestStatus {
    Pending(String),
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Pending(stage) => stage,
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<RequestStatus> for String {
    fn from(value: RequestStatus) -> Self {
        value.label().to_string()
    }
}

impl From<String> for RequestStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Approved" => Self::Approved,
            "Rejected" => Self::Rejected,
            _ => Self::Pending(value),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approved,
    Rejected,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// One recorded decision. Entries are only ever appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEntry {
    pub approver_role: Role,
    pub approver_id: String,
    pub approver_name: String,
    pub status: DecisionStatus,
    pub comment: String,
    pub stage_index: u32,
    pub approved_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: RequestId,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub requester_id: String,
    pub requester_name: String,
    pub summary: String,
    pub current_stage_index: u32,
    pub status: RequestStatus,
    pub approvals: Vec<ApprovalEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submission payload before an id and stage are assigned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub request_type: RequestType,
    pub requester_id: String,
    pub requester_name: String,
    pub summary: String,
}

impl RequestRecord {
    pub fn submit(request: NewRequest, now: DateTime<Utc>) -> Self {
        let initial_stage =
            request.request_type.stages().first().map(|stage| stage.name).unwrap_or("Submitted");

        Self {
            id: RequestId::generate(),
            request_type: request.request_type,
            requester_id: request.requester_id,
            requester_name: request.requester_name,
            summary: request.summary,
            current_stage_index: 0,
            status: RequestStatus::Pending(initial_stage.to_string()),
            approvals: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{NewRequest, RequestRecord, RequestStatus, RequestType};
    use crate::flows::ApprovalError;

    #[test]
    fn submitted_request_starts_at_stage_zero() {
        let record = RequestRecord::submit(
            NewRequest {
                request_type: RequestType::Leave,
                requester_id: "stu-001".to_string(),
                requester_name: "Ada Obi".to_string(),
                summary: "Family emergency".to_string(),
            },
            Utc::now(),
        );

        assert_eq!(record.current_stage_index, 0);
        assert_eq!(record.status, RequestStatus::Pending("Submitted".to_string()));
        assert!(record.approvals.is_empty());
        assert!(record.id.0.starts_with("REQ-"));
        assert!(!record.is_final());
    }

    #[test]
    fn status_serializes_as_display_label() {
        let pending = RequestStatus::Pending("Pending HOD Approval".to_string());
        assert_eq!(
            serde_json::to_string(&pending).expect("serialize"),
            "\"Pending HOD Approval\""
        );

        let decoded: RequestStatus = serde_json::from_str("\"Rejected\"").expect("deserialize");
        assert_eq!(decoded, RequestStatus::Rejected);
        assert!(decoded.is_final());
    }

    #[test]
    fn unknown_request_type_is_reported() {
        assert_eq!(
            "transcript".parse::<RequestType>(),
            Err(ApprovalError::UnknownType { request_type: "transcript".to_string() })
        );
        assert_eq!("Excuse".parse::<RequestType>(), Ok(RequestType::Excuse));
    }
}
