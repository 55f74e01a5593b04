//! Interview sessions and their analysed results

use super::records::{InterviewResult, InterviewSession};
use super::{decode_rows, decode_single, Direction, Query, RecordStore, StoreResult, Table};
use std::sync::Arc;

#[derive(Clone)]
pub struct InterviewRepository {
    store: Arc<dyn RecordStore>,
}

impl InterviewRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn get_session(&self, id: &str) -> StoreResult<InterviewSession> {
        let query = Query::new().eq("id", id);
        let rows = self.store.select(Table::InterviewSessions, &query).await?;
        decode_single(Table::InterviewSessions, &query, rows)
    }

    pub async fn list_sessions_for_job(&self, job_id: &str) -> StoreResult<Vec<InterviewSession>> {
        let query = Query::new()
            .eq("job_post_id", job_id)
            .order("created_at", Direction::Desc);
        decode_rows(self.store.select(Table::InterviewSessions, &query).await?)
    }

    /// Sessions generated for one screened resume
    pub async fn list_sessions_for_candidate(
        &self,
        resume_result_id: &str,
    ) -> StoreResult<Vec<InterviewSession>> {
        let query = Query::new()
            .eq("resume_result_id", resume_result_id)
            .order("created_at", Direction::Desc);
        decode_rows(self.store.select(Table::InterviewSessions, &query).await?)
    }

    /// The analysed result of a session, if one has been stored yet
    pub async fn get_result_for_session(&self, session_id: &str) -> StoreResult<Option<InterviewResult>> {
        let query = Query::new()
            .eq("interview_session_id", session_id)
            .order("created_at", Direction::Desc)
            .limit(1);
        let mut results: Vec<InterviewResult> =
            decode_rows(self.store.select(Table::InterviewResults, &query).await?)?;
        Ok(results.pop())
    }

    /// Results for a job, best score first
    pub async fn list_results_for_job(&self, job_id: &str) -> StoreResult<Vec<InterviewResult>> {
        let query = Query::new()
            .eq("job_post_id", job_id)
            .order("overall_score", Direction::Desc);
        decode_rows(self.store.select(Table::InterviewResults, &query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::records::SessionStatus;
    use crate::store::InMemoryStore;
    use serde_json::json;

    async fn seeded() -> InterviewRepository {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert(
                Table::InterviewSessions,
                vec![
                    json!({"id": "s1", "resume_result_id": "r1", "job_post_id": "j", "status": "completed",
                           "created_at": "2026-01-01T10:00:00Z"}),
                    json!({"id": "s2", "resume_result_id": "r1", "job_post_id": "j", "status": "pending",
                           "created_at": "2026-01-02T10:00:00Z"}),
                    json!({"id": "s3", "resume_result_id": "r2", "job_post_id": "j"}),
                ],
            )
            .await
            .unwrap();
        store
            .insert(
                Table::InterviewResults,
                vec![
                    json!({"id": "x1", "interview_session_id": "s1", "job_post_id": "j", "overall_score": 61}),
                    json!({"id": "x3", "interview_session_id": "s3", "job_post_id": "j", "overall_score": 88}),
                ],
            )
            .await
            .unwrap();
        InterviewRepository::new(store)
    }

    #[tokio::test]
    async fn test_sessions() {
        let interviews = seeded().await;
        let session = interviews.get_session("s1").await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(interviews.get_session("nope").await.unwrap_err().is_not_found());

        let for_candidate = interviews.list_sessions_for_candidate("r1").await.unwrap();
        let ids: Vec<&str> = for_candidate.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);
        assert_eq!(interviews.list_sessions_for_job("j").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_results() {
        let interviews = seeded().await;
        let result = interviews.get_result_for_session("s1").await.unwrap().unwrap();
        assert_eq!(result.id, "x1");
        assert!(interviews.get_result_for_session("s2").await.unwrap().is_none());

        let results = interviews.list_results_for_job("j").await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["x3", "x1"]);
    }
}
