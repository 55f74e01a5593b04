//! Job postings

use super::records::{JobPost, JobUpdate, NewJobPost};
use super::{
    decode_rows, decode_single, now_timestamp, Direction, Query, RecordStore, StoreError,
    StoreResult, Table,
};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct JobRepository {
    store: Arc<dyn RecordStore>,
}

impl JobRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// All job postings, newest first
    pub async fn list(&self) -> StoreResult<Vec<JobPost>> {
        let query = Query::new().order("created_at", Direction::Desc);
        decode_rows(self.store.select(Table::JobPosts, &query).await?)
    }

    pub async fn get(&self, id: &str) -> StoreResult<JobPost> {
        let query = Query::new().eq("id", id);
        let rows = self.store.select(Table::JobPosts, &query).await?;
        decode_single(Table::JobPosts, &query, rows)
    }

    pub async fn create(&self, job: &NewJobPost) -> StoreResult<JobPost> {
        job.validate()?;
        let now = now_timestamp();
        let row = json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "job_role": job.job_role.trim(),
            "required_experience": job.required_experience.trim(),
            "job_description": job.job_description.trim(),
            "status": "active",
            "created_at": now,
            "updated_at": now,
        });
        let rows = self.store.insert(Table::JobPosts, vec![row]).await?;
        let job: JobPost = decode_single(Table::JobPosts, &Query::new(), rows)?;
        tracing::info!(job_id = %job.id, role = %job.job_role, "Created job post");
        Ok(job)
    }

    pub async fn update(&self, id: &str, update: &JobUpdate) -> StoreResult<JobPost> {
        update.validate()?;
        let mut patch = serde_json::to_value(update)?;
        if let Value::Object(map) = &mut patch {
            map.insert("updated_at".into(), Value::String(now_timestamp()));
        }
        let query = Query::new().eq("id", id);
        let rows = self.store.update(Table::JobPosts, &query, patch).await?;
        decode_single(Table::JobPosts, &query, rows)
    }

    /// Store the structured analysis of a job description
    pub async fn set_analysis(&self, id: &str, analysis: Value) -> StoreResult<JobPost> {
        let query = Query::new().eq("id", id);
        let patch = json!({
            "job_description_analysis": analysis,
            "updated_at": now_timestamp(),
        });
        let rows = self.store.update(Table::JobPosts, &query, patch).await?;
        decode_single(Table::JobPosts, &query, rows)
    }

    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let query = Query::new().eq("id", id);
        let removed = self.store.delete(Table::JobPosts, &query).await?;
        if removed.is_empty() {
            return Err(StoreError::not_found(Table::JobPosts, query.describe()));
        }
        tracing::info!(job_id = %id, "Deleted job post");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::records::JobStatus;
    use crate::store::InMemoryStore;

    fn new_job(role: &str) -> NewJobPost {
        NewJobPost {
            job_role: role.into(),
            required_experience: "2+ years".into(),
            job_description: "Design, build and run backend services.".into(),
        }
    }

    fn repo() -> JobRepository {
        JobRepository::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let jobs = repo();
        let created = jobs.create(&new_job("  Backend Engineer ")).await.unwrap();
        assert_eq!(created.job_role, "Backend Engineer");
        assert_eq!(created.status, JobStatus::Active);

        let fetched = jobs.get(&created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let jobs = repo();
        let mut job = new_job("");
        assert!(matches!(jobs.create(&job).await, Err(StoreError::Validation(_))));
        job.job_role = "x".repeat(256);
        assert!(jobs.create(&job).await.is_err());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert(
                Table::JobPosts,
                vec![
                    json!({"id": "old", "job_role": "A", "created_at": "2026-01-01T00:00:00Z"}),
                    json!({"id": "new", "job_role": "B", "created_at": "2026-02-01T00:00:00Z"}),
                ],
            )
            .await
            .unwrap();
        let jobs = JobRepository::new(store);
        let ids: Vec<String> = jobs.list().await.unwrap().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_update_and_analysis() {
        let jobs = repo();
        let job = jobs.create(&new_job("Designer")).await.unwrap();

        let updated = jobs
            .update(
                &job.id,
                &JobUpdate {
                    status: Some(JobStatus::Closed),
                    ..JobUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, JobStatus::Closed);
        assert_eq!(updated.job_role, "Designer");

        let analysed = jobs
            .set_analysis(&job.id, json!({"required_skills": ["figma"]}))
            .await
            .unwrap();
        assert_eq!(
            analysed.job_description_analysis,
            Some(json!({"required_skills": ["figma"]}))
        );
    }

    #[tokio::test]
    async fn test_update_missing_job_is_not_found() {
        let jobs = repo();
        let err = jobs
            .update(
                "missing",
                &JobUpdate {
                    job_role: Some("Anything".into()),
                    ..JobUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete() {
        let jobs = repo();
        let job = jobs.create(&new_job("Analyst")).await.unwrap();
        jobs.delete(&job.id).await.unwrap();
        assert!(jobs.get(&job.id).await.unwrap_err().is_not_found());
        assert!(jobs.delete(&job.id).await.unwrap_err().is_not_found());
    }
}
