use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use registrar_core::domain::actor::Role;
use registrar_core::domain::request::{
    ApprovalEntry, DecisionStatus, RequestId, RequestRecord, RequestStatus, RequestType,
};

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, request_type, requester_id, requester_name, summary,
     current_stage_index, status_kind, status, created_at, updated_at";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<RequestRecord, RepositoryError> {
        let mut record = row_to_request(row)?;
        let entries = sqlx::query(
            "SELECT approver_role, approver_id, approver_name, status, comment, stage_index,
                    approved_at
             FROM approval_entry WHERE request_id = ? ORDER BY sequence ASC",
        )
        .bind(&record.id.0)
        .fetch_all(&self.pool)
        .await?;

        record.approvals = entries.iter().map(row_to_entry).collect::<Result<Vec<_>, _>>()?;
        Ok(record)
    }
}

pub fn status_kind_as_str(status: &RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending(_) => "pending",
        RequestStatus::Approved => "approved",
        RequestStatus::Rejected => "rejected",
    }
}

fn parse_status(kind: &str, label: String) -> Result<RequestStatus, RepositoryError> {
    match kind {
        "pending" => Ok(RequestStatus::Pending(label)),
        "approved" => Ok(RequestStatus::Approved),
        "rejected" => Ok(RequestStatus::Rejected),
        other => Err(RepositoryError::Decode(format!("unknown status kind `{other}`"))),
    }
}

fn parse_decision(raw: &str) -> Result<DecisionStatus, RepositoryError> {
    match raw {
        "approved" => Ok(DecisionStatus::Approved),
        "rejected" => Ok(DecisionStatus::Rejected),
        other => Err(RepositoryError::Decode(format!("unknown decision status `{other}`"))),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {e}")))
}

fn parse_index(raw: i64) -> Result<u32, RepositoryError> {
    u32::try_from(raw).map_err(|_| RepositoryError::Decode(format!("invalid stage index {raw}")))
}

fn decode<T>(row: &SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_request(row: &SqliteRow) -> Result<RequestRecord, RepositoryError> {
    let request_type: String = decode(row, "request_type")?;
    let status_kind: String = decode(row, "status_kind")?;
    let created_at: String = decode(row, "created_at")?;
    let updated_at: String = decode(row, "updated_at")?;

    Ok(RequestRecord {
        id: RequestId(decode(row, "id")?),
        request_type: request_type
            .parse::<RequestType>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        requester_id: decode(row, "requester_id")?,
        requester_name: decode(row, "requester_name")?,
        summary: decode(row, "summary")?,
        current_stage_index: parse_index(decode(row, "current_stage_index")?)?,
        status: parse_status(&status_kind, decode(row, "status")?)?,
        approvals: Vec::new(),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<ApprovalEntry, RepositoryError> {
    let role: String = decode(row, "approver_role")?;
    let status: String = decode(row, "status")?;
    let approved_at: String = decode(row, "approved_at")?;

    Ok(ApprovalEntry {
        approver_role: role.parse::<Role>().map_err(|e| RepositoryError::Decode(e.to_string()))?,
        approver_id: decode(row, "approver_id")?,
        approver_name: decode(row, "approver_name")?,
        status: parse_decision(&status)?,
        comment: decode(row, "comment")?,
        stage_index: parse_index(decode(row, "stage_index")?)?,
        approved_at: parse_timestamp(&approved_at)?,
    })
}

async fn insert_entry(
    conn: &mut SqliteConnection,
    request_id: &RequestId,
    sequence: usize,
    entry: &ApprovalEntry,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO approval_entry (request_id, sequence, approver_role, approver_id,
                                     approver_name, status, comment, stage_index, approved_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&request_id.0)
    .bind(sequence as i64)
    .bind(entry.approver_role.as_str())
    .bind(&entry.approver_id)
    .bind(&entry.approver_name)
    .bind(entry.status.as_str())
    .bind(&entry.comment)
    .bind(i64::from(entry.stage_index))
    .bind(entry.approved_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<RequestRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM academic_request WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(self.hydrate(r).await?)),
            None => Ok(None),
        }
    }

    async fn create(&self, record: RequestRecord) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO academic_request (id, request_type, requester_id, requester_name, summary,
                                           current_stage_index, status_kind, status,
                                           created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(record.request_type.as_str())
        .bind(&record.requester_id)
        .bind(&record.requester_name)
        .bind(&record.summary)
        .bind(i64::from(record.current_stage_index))
        .bind(status_kind_as_str(&record.status))
        .bind(record.status.label())
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(ref db_error)) = inserted {
            if db_error.is_unique_violation() {
                return Err(RepositoryError::Duplicate { request_id: record.id.0.clone() });
            }
        }
        inserted?;

        for (sequence, entry) in record.approvals.iter().enumerate() {
            insert_entry(&mut tx, &record.id, sequence, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn commit_transition(
        &self,
        record: RequestRecord,
        expected_stage_index: u32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE academic_request
             SET current_stage_index = ?, status_kind = ?, status = ?, updated_at = ?
             WHERE id = ? AND current_stage_index = ? AND status_kind = 'pending'",
        )
        .bind(i64::from(record.current_stage_index))
        .bind(status_kind_as_str(&record.status))
        .bind(record.status.label())
        .bind(record.updated_at.to_rfc3339())
        .bind(&record.id.0)
        .bind(i64::from(expected_stage_index))
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM academic_request WHERE id = ?")
                    .bind(&record.id.0)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            let request_id = record.id.0;
            return Err(if exists.is_some() {
                RepositoryError::Conflict { request_id }
            } else {
                RepositoryError::NotFound { request_id }
            });
        }

        let stored: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM approval_entry WHERE request_id = ?")
                .bind(&record.id.0)
                .fetch_one(&mut *tx)
                .await?;
        let stored = usize::try_from(stored).unwrap_or(0);

        for (sequence, entry) in record.approvals.iter().enumerate().skip(stored) {
            insert_entry(&mut tx, &record.id, sequence, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_by_requester(
        &self,
        requester_id: &str,
    ) -> Result<Vec<RequestRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM academic_request
             WHERE requester_id = ? ORDER BY created_at DESC"
        ))
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(self.hydrate(row).await?);
        }
        Ok(records)
    }

    async fn list_open(&self, limit: u32) -> Result<Vec<RequestRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM academic_request
             WHERE status_kind = 'pending' ORDER BY created_at ASC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(self.hydrate(row).await?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use registrar_core::domain::actor::{Actor, Role};
    use registrar_core::domain::request::{
        DecisionStatus, NewRequest, RequestId, RequestRecord, RequestStatus, RequestType,
    };
    use registrar_core::flows::{StageEngine, TransitionRequest};

    use super::SqlRequestRepository;
    use crate::repositories::{RepositoryError, RequestRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlRequestRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlRequestRepository::new(pool)
    }

    fn sample_request(request_type: RequestType, requester_id: &str) -> RequestRecord {
        RequestRecord::submit(
            NewRequest {
                request_type,
                requester_id: requester_id.to_string(),
                requester_name: "Chioma Eze".to_string(),
                summary: "Attending a conference".to_string(),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn create_and_find_by_id() {
        let repo = setup().await;
        let record = sample_request(RequestType::Leave, "stu-1");

        repo.create(record.clone()).await.expect("create");
        let found = repo.find_by_id(&record.id).await.expect("find").expect("should exist");

        assert_eq!(found.id, record.id);
        assert_eq!(found.request_type, RequestType::Leave);
        assert_eq!(found.status, RequestStatus::Pending("Submitted".to_string()));
        assert_eq!(found.current_stage_index, 0);
        assert!(found.approvals.is_empty());
    }

    #[tokio::test]
    async fn missing_request_is_none() {
        let repo = setup().await;
        let found = repo.find_by_id(&RequestId("REQ-missing".to_string())).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let repo = setup().await;
        let record = sample_request(RequestType::Letter, "stu-1");

        repo.create(record.clone()).await.expect("create");
        let error = repo.create(record).await.expect_err("duplicate");
        assert!(matches!(error, RepositoryError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn commit_transition_persists_history_in_order() {
        let repo = setup().await;
        let engine = StageEngine::default();
        let record = sample_request(RequestType::Leave, "stu-2");
        repo.create(record.clone()).await.expect("create");

        let dispatched = engine.dispatch(&record, Utc::now()).expect("dispatch").record;
        repo.commit_transition(dispatched.clone(), 0).await.expect("commit dispatch");

        let lecturer = Actor::new("lec-1", "Dr. Musa", Role::Lecturer);
        let approved = engine
            .apply(&dispatched, &TransitionRequest::approve(lecturer, Some("fine".to_string())))
            .expect("approve")
            .record;
        repo.commit_transition(approved.clone(), 1).await.expect("commit approve");

        let hod = Actor::new("hod-1", "Prof. Bala", Role::Hod);
        let rejected = engine
            .apply(&approved, &TransitionRequest::reject(hod, "dates clash with exams"))
            .expect("reject")
            .record;
        repo.commit_transition(rejected, 2).await.expect("commit reject");

        let stored = repo.find_by_id(&record.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, RequestStatus::Rejected);
        assert_eq!(stored.current_stage_index, 2);
        assert_eq!(stored.approvals.len(), 2);
        assert_eq!(stored.approvals[0].approver_role, Role::Lecturer);
        assert_eq!(stored.approvals[0].comment, "fine");
        assert_eq!(stored.approvals[1].status, DecisionStatus::Rejected);
        assert_eq!(stored.approvals[1].stage_index, 2);
    }

    #[tokio::test]
    async fn stale_commit_is_a_conflict_and_leaves_row_untouched() {
        let repo = setup().await;
        let engine = StageEngine::default();
        let record = sample_request(RequestType::Excuse, "stu-3");
        let dispatched = engine.dispatch(&record, Utc::now()).expect("dispatch").record;
        repo.create(dispatched.clone()).await.expect("create");

        let first = Actor::new("lec-1", "Dr. Musa", Role::Lecturer);
        let second = Actor::new("lec-2", "Dr. Lawal", Role::Lecturer);
        let winner = engine
            .apply(&dispatched, &TransitionRequest::approve(first, None))
            .expect("first approve")
            .record;
        let loser = engine
            .apply(&dispatched, &TransitionRequest::approve(second, None))
            .expect("second approve computed from stale read")
            .record;

        repo.commit_transition(winner, 1).await.expect("first commit wins");
        let error = repo.commit_transition(loser, 1).await.expect_err("stale commit");
        assert!(matches!(error, RepositoryError::Conflict { .. }));

        let stored = repo.find_by_id(&record.id).await.expect("find").expect("exists");
        assert_eq!(stored.current_stage_index, 2);
        assert_eq!(stored.approvals.len(), 1);
        assert_eq!(stored.approvals[0].approver_id, "lec-1");
    }

    #[tokio::test]
    async fn commit_against_missing_request_is_not_found() {
        let repo = setup().await;
        let record = sample_request(RequestType::Letter, "stu-4");

        let error = repo.commit_transition(record, 0).await.expect_err("missing");
        assert!(matches!(error, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_queries_filter_by_requester_and_open_status() {
        let repo = setup().await;
        let mut older = sample_request(RequestType::Leave, "stu-5");
        older.created_at = Utc::now() - Duration::hours(2);
        let newer = sample_request(RequestType::Letter, "stu-5");
        let mut closed = sample_request(RequestType::Excuse, "stu-6");
        closed.status = RequestStatus::Rejected;

        repo.create(older.clone()).await.expect("create older");
        repo.create(newer.clone()).await.expect("create newer");
        repo.create(closed).await.expect("create closed");

        let mine = repo.list_by_requester("stu-5").await.expect("list mine");
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, newer.id, "newest first");

        let open = repo.list_open(10).await.expect("list open");
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].id, older.id, "oldest first");

        assert_eq!(repo.list_open(1).await.expect("limited").len(), 1);
    }
}
