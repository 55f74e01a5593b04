//! Analysis API
//!
//! The remote service that scores resumes, generates interview links and
//! analyses interview transcripts. Most responses come wrapped in an
//! [`Envelope`]; job endpoints return their payload directly.

pub mod client;

pub use client::AnalysisClient;

use crate::store::records::{
    InterviewResult, InterviewSession, NewJobPost, SecurityViolations, SessionStatus,
    TranscriptEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The service answered with an error envelope
    #[error("{0}")]
    Remote(String),

    #[error("Response is missing its payload")]
    MissingPayload,

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    Validation(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// Response wrapper: a status discriminator plus a payload or an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    #[serde(default, alias = "results")]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Envelope {
    pub fn into_result<T: DeserializeOwned>(self) -> ApiResult<T> {
        match self.status {
            EnvelopeStatus::Success => {
                let data = self.data.ok_or(ApiError::MissingPayload)?;
                Ok(serde_json::from_value(data)?)
            }
            EnvelopeStatus::Error => Err(ApiError::Remote(
                self.error
                    .or(self.message)
                    .unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJobRequest {
    pub job_role: String,
    pub required_experience: String,
    pub description: String,
}

impl From<&NewJobPost> for NewJobRequest {
    fn from(job: &NewJobPost) -> Self {
        Self {
            job_role: job.job_role.trim().to_string(),
            required_experience: job.required_experience.trim().to_string(),
            description: job.job_description.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: String,
    pub status: String,
}

/// Resume processing progress for a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub job_id: String,
    pub total_resumes: u64,
    pub processed_resumes: u64,
    pub pending_resumes: u64,
    pub completion_percentage: f64,
}

impl ProcessingStatus {
    pub fn is_complete(&self) -> bool {
        self.total_resumes > 0 && self.pending_resumes == 0
    }
}

/// A resume file submitted for screening
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeFile {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl ResumeFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            content,
        }
    }
}

/// Acknowledgement of a resume batch; scoring continues in the background
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeUpload {
    pub job_id: String,
    pub resumes_uploaded: u32,
    pub files_read: u32,
    pub total_files: u32,
    pub status: String,
}

/// Outcome of re-scoring every stored interview transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReanalysisSummary {
    pub successful: u32,
    pub failed: u32,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewLink {
    pub session_id: String,
    pub session_url: String,
    pub candidate_name: String,
    pub job_role: String,
    pub questions_count: u32,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub interview_focus: String,
}

/// What a candidate's interview page needs to run a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    #[serde(default)]
    pub candidate_name: Option<String>,
    #[serde(default)]
    pub interview_prompt: Option<String>,
    #[serde(default)]
    pub generated_questions: Option<Value>,
    pub status: SessionStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A finished interview sent for scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSubmission {
    pub transcript: String,
    #[serde(default)]
    pub transcript_entries: Vec<TranscriptEntry>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: i64,
    #[serde(default)]
    pub cheating_flags: Vec<String>,
    #[serde(default)]
    pub fullscreen_exit_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
}

/// Allowed gap between the reported duration and the timestamps
const DURATION_TOLERANCE_SECS: i64 = 2;

impl TranscriptSubmission {
    pub fn validate(&self) -> ApiResult<()> {
        if self.ended_at < self.started_at {
            return Err(ApiError::Validation(
                "interview cannot end before it starts".into(),
            ));
        }
        if self.duration_seconds < 0 {
            return Err(ApiError::Validation("duration cannot be negative".into()));
        }
        let elapsed = (self.ended_at - self.started_at).num_seconds();
        if (elapsed - self.duration_seconds).abs() > DURATION_TOLERANCE_SECS {
            return Err(ApiError::Validation(format!(
                "duration of {}s does not match the {elapsed}s between start and end",
                self.duration_seconds
            )));
        }
        Ok(())
    }
}

/// Transcript as stored after an interview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTranscript {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub transcript_entries: Vec<TranscriptEntry>,
    #[serde(default)]
    pub transcript_source: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub security_violations: Option<SecurityViolations>,
    #[serde(default)]
    pub candidate_name: Option<String>,
}

/// Remote analysis operations
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Register a job and start analysing its description
    async fn create_job(&self, job: &NewJobRequest) -> ApiResult<JobCreated>;

    async fn job_status(&self, job_id: &str) -> ApiResult<ProcessingStatus>;

    /// Submit resumes to be scored against a job
    async fn upload_resumes(&self, job_id: &str, files: &[ResumeFile]) -> ApiResult<ResumeUpload>;

    /// Generate a time-limited interview link for a screened candidate
    async fn generate_interview_link(&self, candidate_id: &str) -> ApiResult<InterviewLink>;

    async fn get_interview_session(&self, session_id: &str) -> ApiResult<SessionView>;

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> ApiResult<InterviewSession>;

    /// Link a session to the voice agent's conversation
    async fn update_session_conversation(
        &self,
        session_id: &str,
        conversation_id: &str,
    ) -> ApiResult<InterviewSession>;

    async fn complete_with_transcript(
        &self,
        session_id: &str,
        submission: &TranscriptSubmission,
    ) -> ApiResult<InterviewResult>;

    async fn get_transcript(&self, session_id: &str) -> ApiResult<StoredTranscript>;

    async fn reanalyze_transcript(
        &self,
        session_id: &str,
        reason: Option<&str>,
    ) -> ApiResult<InterviewResult>;

    /// Re-score every interview that has a stored transcript
    async fn reanalyze_all(&self) -> ApiResult<ReanalysisSummary>;

    async fn get_interview_results(&self, session_id: &str) -> ApiResult<InterviewResult>;

    async fn list_job_interview_results(&self, job_id: &str) -> ApiResult<Vec<InterviewResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission(duration: i64) -> TranscriptSubmission {
        TranscriptSubmission {
            transcript: "AI: Hello\nUSER: Hi".into(),
            transcript_entries: Vec::new(),
            started_at: "2026-05-01T10:00:00Z".parse().unwrap(),
            ended_at: "2026-05-01T10:12:00Z".parse().unwrap(),
            duration_seconds: duration,
            cheating_flags: Vec::new(),
            fullscreen_exit_count: 0,
            recording_url: None,
        }
    }

    #[test]
    fn test_envelope_success() {
        let envelope: Envelope = serde_json::from_value(json!({
            "status": "success",
            "data": {"job_id": "j1", "status": "queued"},
            "message": "ok"
        }))
        .unwrap();
        let created: JobCreated = envelope.into_result().unwrap();
        assert_eq!(created.job_id, "j1");
    }

    #[test]
    fn test_envelope_results_alias() {
        let envelope: Envelope =
            serde_json::from_value(json!({"status": "success", "results": [1, 2, 3]})).unwrap();
        let values: Vec<u32> = envelope.into_result().unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_envelope_error() {
        let envelope: Envelope = serde_json::from_value(json!({
            "status": "error",
            "error": "Interview session has expired"
        }))
        .unwrap();
        let err = envelope.into_result::<Value>().unwrap_err();
        assert!(matches!(&err, ApiError::Remote(m) if m == "Interview session has expired"));

        let bare: Envelope = serde_json::from_value(json!({"status": "success"})).unwrap();
        assert!(matches!(bare.into_result::<Value>(), Err(ApiError::MissingPayload)));
    }

    #[test]
    fn test_submission_validation() {
        assert!(submission(720).validate().is_ok());
        assert!(submission(721).validate().is_ok());
        assert!(submission(600).validate().is_err());

        let mut backwards = submission(0);
        std::mem::swap(&mut backwards.started_at, &mut backwards.ended_at);
        assert!(backwards.validate().is_err());
    }

    #[test]
    fn test_job_request_from_new_job() {
        let job = NewJobPost {
            job_role: " Data Engineer ".into(),
            required_experience: "3 years".into(),
            job_description: "Own the ingestion pipelines.".into(),
        };
        let request = NewJobRequest::from(&job);
        assert_eq!(request.job_role, "Data Engineer");
        assert_eq!(request.description, "Own the ingestion pipelines.");
    }

    #[test]
    fn test_submission_omits_missing_recording() {
        let value = serde_json::to_value(submission(720)).unwrap();
        assert!(value.get("recording_url").is_none());
        assert_eq!(value["fullscreen_exit_count"], 0);
    }
}
