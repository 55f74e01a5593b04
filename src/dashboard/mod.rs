//! Dashboard service
//!
//! What the screens of the dashboard call: cached reads over the store and the
//! analysis API, and writes that keep the cache honest.

pub mod keys;

use crate::api::{
    AnalysisApi, InterviewLink, NewJobRequest, ProcessingStatus, ReanalysisSummary, ResumeFile,
    ResumeUpload, SessionView, StoredTranscript, TranscriptSubmission,
};
use crate::cache::QueryCache;
use crate::recorder::{ArtifactUploader, RecordingSession};
use crate::store::records::{
    CandidateLevel, CandidateType, InterviewResult, InterviewSession, InterviewSetup,
    InterviewSetupUpdate, JobPost, JobUpdate, NewInterviewSetup, NewJobPost, SessionStatus,
};
use crate::store::resumes::{ResumeFilter, ResumePage};
use crate::store::setups::SetupMatrix;
use crate::store::{
    InterviewRepository, InterviewSetupRepository, JobRepository, RecordStore, ResumeRepository,
};
use crate::utils::error::{AppError, AppResult};
use std::sync::Arc;

pub struct Dashboard {
    jobs: JobRepository,
    resumes: ResumeRepository,
    setups: InterviewSetupRepository,
    interviews: InterviewRepository,
    api: Arc<dyn AnalysisApi>,
    cache: QueryCache,
}

impl Dashboard {
    pub fn new(store: Arc<dyn RecordStore>, api: Arc<dyn AnalysisApi>, cache: QueryCache) -> Self {
        Self {
            jobs: JobRepository::new(store.clone()),
            resumes: ResumeRepository::new(store.clone()),
            setups: InterviewSetupRepository::new(store.clone()),
            interviews: InterviewRepository::new(store),
            api,
            cache,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    // -----------------------------------------------------------------------
    // Jobs
    // -----------------------------------------------------------------------

    pub async fn jobs(&self) -> AppResult<Vec<JobPost>> {
        self.cache
            .fetch(keys::jobs(), || async { Ok::<_, AppError>(self.jobs.list().await?) })
            .await
    }

    pub async fn job(&self, job_id: &str) -> AppResult<JobPost> {
        self.cache
            .fetch(keys::job(job_id), || async { Ok::<_, AppError>(self.jobs.get(job_id).await?) })
            .await
    }

    /// Create a job through the analysis API, which also starts analysing its
    /// description, then read back the stored posting
    pub async fn create_job(&self, job: &NewJobPost) -> AppResult<JobPost> {
        job.validate()?;
        let created = self.api.create_job(&NewJobRequest::from(job)).await?;
        tracing::info!(job_id = %created.job_id, status = %created.status, "Job submitted for analysis");
        self.cache.invalidate(&keys::jobs());

        let stored = self.jobs.get(&created.job_id).await?;
        self.cache.set_query_data(keys::job(&stored.id), stored.clone());
        Ok(stored)
    }

    /// Update a job, showing the change in the cache before the store confirms it
    ///
    /// If the store rejects the update the cached job is put back as it was.
    pub async fn update_job(&self, job_id: &str, update: &JobUpdate) -> AppResult<JobPost> {
        update.validate()?;

        let key = keys::job(job_id);
        let previous = self.cache.peek::<JobPost>(&key);
        if let Some(job) = &previous {
            let mut optimistic = job.clone();
            update.apply_to(&mut optimistic);
            self.cache.set_query_data(key.clone(), optimistic);
        }

        match self.jobs.update(job_id, update).await {
            Ok(updated) => {
                self.cache.set_query_data(key, updated.clone());
                self.cache.invalidate(&keys::jobs());
                Ok(updated)
            }
            Err(err) => {
                tracing::warn!(job_id = %job_id, "Job update failed, rolling back: {}", err);
                match previous {
                    Some(job) => self.cache.set_query_data(key, job),
                    None => self.cache.remove(&key),
                }
                Err(err.into())
            }
        }
    }

    pub async fn delete_job(&self, job_id: &str) -> AppResult<()> {
        self.jobs.delete(job_id).await?;
        self.cache.invalidate(&keys::jobs());
        self.cache.invalidate(&keys::job(job_id));
        Ok(())
    }

    /// Resume processing progress; always fetched live
    pub async fn job_processing_status(&self, job_id: &str) -> AppResult<ProcessingStatus> {
        Ok(self.api.job_status(job_id).await?)
    }

    // -----------------------------------------------------------------------
    // Resumes
    // -----------------------------------------------------------------------

    pub async fn upload_resumes(&self, job_id: &str, files: &[ResumeFile]) -> AppResult<ResumeUpload> {
        let upload = self.api.upload_resumes(job_id, files).await?;
        self.cache.invalidate(&keys::job_resumes(job_id));
        Ok(upload)
    }

    pub async fn resumes(&self, job_id: &str, filter: &ResumeFilter) -> AppResult<ResumePage> {
        let filter_key = serde_json::to_string(filter)?;
        self.cache
            .fetch(keys::resumes(job_id, &filter_key), || async {
                Ok::<_, AppError>(self.resumes.list_for_job(job_id, filter).await?)
            })
            .await
    }

    // -----------------------------------------------------------------------
    // Interview setups
    // -----------------------------------------------------------------------

    pub async fn interview_setups(&self, job_id: &str) -> AppResult<Vec<InterviewSetup>> {
        self.cache
            .fetch(keys::setups(job_id), || async {
                Ok::<_, AppError>(self.setups.list_active(job_id).await?)
            })
            .await
    }

    pub async fn setup_matrix(&self, job_id: &str) -> AppResult<SetupMatrix> {
        self.cache
            .fetch(keys::setup_matrix(job_id), || async {
                Ok::<_, AppError>(self.setups.matrix(job_id).await?)
            })
            .await
    }

    fn invalidate_setups(&self, job_id: &str) {
        self.cache.invalidate(&keys::setups(job_id));
        self.cache.invalidate(&keys::setup_matrix(job_id));
    }

    pub async fn create_setup(&self, job_id: &str, config: &NewInterviewSetup) -> AppResult<InterviewSetup> {
        let setup = self.setups.create(job_id, config).await?;
        self.invalidate_setups(job_id);
        Ok(setup)
    }

    pub async fn bulk_create_setups(
        &self,
        job_id: &str,
        configs: &[NewInterviewSetup],
        replace_all: bool,
    ) -> AppResult<Vec<InterviewSetup>> {
        let setups = self.setups.bulk_create(job_id, configs, replace_all).await?;
        self.invalidate_setups(job_id);
        Ok(setups)
    }

    pub async fn update_setup(
        &self,
        job_id: &str,
        setup_id: &str,
        update: &InterviewSetupUpdate,
    ) -> AppResult<InterviewSetup> {
        let setup = self.setups.update(setup_id, update).await?;
        self.invalidate_setups(job_id);
        Ok(setup)
    }

    pub async fn update_setup_by_role(
        &self,
        job_id: &str,
        role_type: CandidateType,
        level: CandidateLevel,
        update: &InterviewSetupUpdate,
    ) -> AppResult<InterviewSetup> {
        let setup = self.setups.update_by_role(job_id, role_type, level, update).await?;
        self.invalidate_setups(job_id);
        Ok(setup)
    }

    pub async fn update_interview_percentages(
        &self,
        job_id: &str,
        setup_id: &str,
        screening: u32,
        domain: u32,
        behavioral: u32,
    ) -> AppResult<InterviewSetup> {
        let setup = self
            .setups
            .update_interview_percentages(setup_id, screening, domain, behavioral)
            .await?;
        self.invalidate_setups(job_id);
        Ok(setup)
    }

    pub async fn deactivate_setup(&self, job_id: &str, setup_id: &str) -> AppResult<()> {
        self.setups.deactivate(setup_id).await?;
        self.invalidate_setups(job_id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Interviews
    // -----------------------------------------------------------------------

    pub async fn candidate_sessions(&self, resume_result_id: &str) -> AppResult<Vec<InterviewSession>> {
        self.cache
            .fetch(keys::candidate_sessions(resume_result_id), || async {
                Ok::<_, AppError>(self.interviews.list_sessions_for_candidate(resume_result_id).await?)
            })
            .await
    }

    pub async fn generate_interview_link(&self, resume_result_id: &str) -> AppResult<InterviewLink> {
        let link = self.api.generate_interview_link(resume_result_id).await?;
        self.cache.invalidate(&keys::candidate_sessions(resume_result_id));
        Ok(link)
    }

    pub async fn interview_session(&self, session_id: &str) -> AppResult<SessionView> {
        self.cache
            .fetch(keys::session(session_id), || async {
                Ok::<_, AppError>(self.api.get_interview_session(session_id).await?)
            })
            .await
    }

    /// Attach the voice agent's conversation to a session
    pub async fn link_conversation(
        &self,
        session_id: &str,
        conversation_id: &str,
    ) -> AppResult<InterviewSession> {
        let session = self
            .api
            .update_session_conversation(session_id, conversation_id)
            .await?;
        self.cache.invalidate(&keys::session(session_id));
        Ok(session)
    }

    pub async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> AppResult<InterviewSession> {
        let session = self.api.update_session_status(session_id, status).await?;
        self.cache.invalidate(&keys::session(session_id));
        self.cache.invalidate(&keys::candidate_sessions(&session.resume_result_id));
        Ok(session)
    }

    /// Scored interviews of a job, as enriched by the analysis API
    pub async fn interview_results(&self, job_id: &str) -> AppResult<Vec<InterviewResult>> {
        self.cache
            .fetch(keys::interview_results(job_id), || async {
                Ok::<_, AppError>(self.api.list_job_interview_results(job_id).await?)
            })
            .await
    }

    pub async fn interview_result(&self, session_id: &str) -> AppResult<InterviewResult> {
        self.cache
            .fetch(keys::session_result(session_id), || async {
                Ok::<_, AppError>(self.api.get_interview_results(session_id).await?)
            })
            .await
    }

    pub async fn transcript(&self, session_id: &str) -> AppResult<StoredTranscript> {
        self.cache
            .fetch(keys::transcript(session_id), || async {
                Ok::<_, AppError>(self.api.get_transcript(session_id).await?)
            })
            .await
    }

    fn invalidate_result(&self, session_id: &str, result: &InterviewResult) {
        self.cache.invalidate(&keys::session(session_id));
        if let Some(job_id) = &result.job_post_id {
            self.cache.invalidate(&keys::interview_results(job_id));
        }
    }

    pub async fn submit_transcript(
        &self,
        session_id: &str,
        submission: &TranscriptSubmission,
    ) -> AppResult<InterviewResult> {
        let result = self.api.complete_with_transcript(session_id, submission).await?;
        self.invalidate_result(session_id, &result);
        Ok(result)
    }

    pub async fn reanalyze_transcript(
        &self,
        session_id: &str,
        reason: Option<&str>,
    ) -> AppResult<InterviewResult> {
        let result = self.api.reanalyze_transcript(session_id, reason).await?;
        self.invalidate_result(session_id, &result);
        Ok(result)
    }

    pub async fn reanalyze_all(&self) -> AppResult<ReanalysisSummary> {
        let summary = self.api.reanalyze_all().await?;
        // Results of every job and session may have changed.
        self.cache.clear();
        Ok(summary)
    }

    /// End an interview: stop the recording, upload it and submit the transcript
    ///
    /// The transcript is submitted even when there is no recording or the
    /// upload fails; it then carries no recording URL.
    pub async fn finish_interview(
        &self,
        recorder: &RecordingSession,
        uploader: &dyn ArtifactUploader,
        session_id: &str,
        mut submission: TranscriptSubmission,
    ) -> AppResult<InterviewResult> {
        submission.recording_url = None;

        // The session keeps the artifact after any stop, including one it made
        // on its own when the capture source went away.
        recorder.stop_recording().await;
        match recorder.take_artifact() {
            Some(artifact) if !artifact.is_empty() => {
                let name = format!(
                    "interview-{session_id}-{}.{}",
                    submission.ended_at.format("%Y%m%dT%H%M%SZ"),
                    artifact.extension()
                );
                match uploader.upload(&artifact, &name).await {
                    Ok(url) => submission.recording_url = Some(url),
                    Err(err) => {
                        tracing::warn!(session_id = %session_id, "Recording upload failed: {}", err)
                    }
                }
            }
            _ => tracing::info!(session_id = %session_id, "No recording to upload"),
        }

        self.submit_transcript(session_id, &submission).await
    }
}
