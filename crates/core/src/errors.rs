use thiserror::Error;

use crate::flows::ApprovalError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("request `{0}` was not found")]
    NotFound(String),
    #[error("request `{request_id}` changed since it was read; reload and retry")]
    Conflict { request_id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<ApprovalError> for ApplicationError {
    fn from(value: ApprovalError) -> Self {
        Self::Domain(DomainError::Approval(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("unprocessable: {message}")]
    Unprocessable { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not the approver for this stage.",
            Self::NotFound { .. } => "The request could not be found.",
            Self::Conflict { .. } => {
                "This request has already been acted on. Refresh to see its current status."
            }
            Self::Unprocessable { .. } => {
                "The request is in an inconsistent state. Contact the registry."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::Unprocessable { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::Unprocessable { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    /// Stable machine-readable class shared by the CLI and HTTP surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::Approval(error)) => error.kind(),
            Self::Domain(DomainError::InvariantViolation(_)) => "invariant_violation",
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::Unprocessable { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Approval(error)) => {
                let message = error.to_string();
                match error {
                    ApprovalError::Unauthorized { .. } => Self::Forbidden { message, correlation_id },
                    ApprovalError::AlreadyFinalized { .. } | ApprovalError::InvalidDispatch { .. } => {
                        Self::Conflict { message, correlation_id }
                    }
                    ApprovalError::IndexOutOfRange { .. } => {
                        Self::Unprocessable { message, correlation_id }
                    }
                    ApprovalError::Validation(_)
                    | ApprovalError::UnknownType { .. }
                    | ApprovalError::UnknownRole { .. } => {
                        Self::BadRequest { message, correlation_id }
                    }
                }
            }
            ApplicationError::Domain(DomainError::InvariantViolation(message)) => {
                Self::Unprocessable { message, correlation_id }
            }
            ApplicationError::NotFound(id) => {
                Self::NotFound { message: format!("request `{id}` was not found"), correlation_id }
            }
            ApplicationError::Conflict { request_id } => Self::Conflict {
                message: format!("request `{request_id}` changed since it was read"),
                correlation_id,
            },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
