use async_trait::async_trait;
use thiserror::Error;

use registrar_core::domain::request::{RequestId, RequestRecord};
use registrar_core::errors::ApplicationError;

pub mod memory;
pub mod request;

pub use memory::InMemoryRequestRepository;
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("request `{request_id}` already exists")]
    Duplicate { request_id: String },
    #[error("request `{request_id}` was not found")]
    NotFound { request_id: String },
    #[error("request `{request_id}` was modified concurrently")]
    Conflict { request_id: String },
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound { request_id } => Self::NotFound(request_id),
            RepositoryError::Conflict { request_id } => Self::Conflict { request_id },
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Authoritative store for request records.
///
/// `commit_transition` is a compare-and-set: it applies `record` only while
/// the stored row is still pending at `expected_stage_index`, and appends any
/// approval entries beyond those already stored.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError>;

    async fn create(&self, record: RequestRecord) -> Result<(), RepositoryError>;

    async fn commit_transition(
        &self,
        record: RequestRecord,
        expected_stage_index: u32,
    ) -> Result<(), RepositoryError>;

    async fn list_by_requester(
        &self,
        requester_id: &str,
    ) -> Result<Vec<RequestRecord>, RepositoryError>;

    /// Pending requests, oldest first.
    async fn list_open(&self, limit: u32) -> Result<Vec<RequestRecord>, RepositoryError>;
}
