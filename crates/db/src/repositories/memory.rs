use std::collections::HashMap;

use tokio::sync::RwLock;

use registrar_core::domain::request::{RequestId, RequestRecord};

use super::{RepositoryError, RequestRepository};

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, RequestRecord>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn create(&self, record: RequestRecord) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&record.id.0) {
            return Err(RepositoryError::Duplicate { request_id: record.id.0 });
        }
        requests.insert(record.id.0.clone(), record);
        Ok(())
    }

    async fn commit_transition(
        &self,
        record: RequestRecord,
        expected_stage_index: u32,
    ) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        let Some(stored) = requests.get_mut(&record.id.0) else {
            return Err(RepositoryError::NotFound { request_id: record.id.0 });
        };

        if stored.is_final() || stored.current_stage_index != expected_stage_index {
            return Err(RepositoryError::Conflict { request_id: record.id.0 });
        }

        *stored = record;
        Ok(())
    }

    async fn list_by_requester(
        &self,
        requester_id: &str,
    ) -> Result<Vec<RequestRecord>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut matching: Vec<RequestRecord> =
            requests.values().filter(|r| r.requester_id == requester_id).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn list_open(&self, limit: u32) -> Result<Vec<RequestRecord>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut open: Vec<RequestRecord> =
            requests.values().filter(|r| !r.is_final()).cloned().collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        open.truncate(limit as usize);
        Ok(open)
    }
}
