//! HTTP client for the analysis API

use super::{
    AnalysisApi, ApiError, ApiResult, Envelope, EnvelopeStatus, InterviewLink, JobCreated,
    NewJobRequest, ProcessingStatus, ReanalysisSummary, ResumeFile, ResumeUpload, SessionView,
    StoredTranscript, TranscriptSubmission,
};
use crate::config::ApiConfig;
use crate::store::records::{InterviewResult, InterviewSession, SessionStatus};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

/// Error body of endpoints that do not use the envelope
#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Bulk re-analysis reports its counts beside the status, not in `data`
#[derive(Debug, Deserialize)]
struct ReanalyzeAllResponse {
    status: EnvelopeStatus,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    successful: u32,
    #[serde(default)]
    failed: u32,
}

pub struct AnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `segments` are percent-encoded; literal parts are passed as-is
    fn url(&self, segments: &[Segment<'_>]) -> String {
        let mut url = format!("{}/api", self.base_url);
        for segment in segments {
            url.push('/');
            match segment {
                Segment::Lit(part) => url.push_str(part),
                Segment::Id(id) => url.push_str(&urlencoding::encode(id)),
            }
        }
        url
    }

    fn request(&self, method: Method, segments: &[Segment<'_>]) -> RequestBuilder {
        let url = self.url(segments);
        tracing::debug!(%method, %url, "Analysis API request");
        self.client.request(method, url)
    }

    /// Body of a successful response, or the service's error message
    async fn checked(response: Response) -> ApiResult<String> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ErrorDetail>(&body)
            .ok()
            .and_then(|e| e.detail.or(e.error))
            .unwrap_or(body);
        tracing::warn!(status = status.as_u16(), "Analysis API error: {}", message);
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_raw<T: DeserializeOwned>(request: RequestBuilder) -> ApiResult<T> {
        let body = Self::checked(request.send().await?).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_envelope<T: DeserializeOwned>(request: RequestBuilder) -> ApiResult<T> {
        let body = Self::checked(request.send().await?).await?;
        let envelope: Envelope = serde_json::from_str(&body)?;
        envelope.into_result().map_err(|err| {
            if let ApiError::Remote(message) = &err {
                tracing::warn!("Analysis API rejected request: {}", message);
            }
            err
        })
    }
}

enum Segment<'a> {
    Lit(&'a str),
    Id(&'a str),
}

use Segment::{Id, Lit};

#[async_trait]
impl AnalysisApi for AnalysisClient {
    async fn create_job(&self, job: &NewJobRequest) -> ApiResult<JobCreated> {
        Self::send_raw(self.request(Method::POST, &[Lit("jobs")]).json(job)).await
    }

    async fn job_status(&self, job_id: &str) -> ApiResult<ProcessingStatus> {
        Self::send_raw(self.request(Method::GET, &[Lit("jobs"), Id(job_id), Lit("status")])).await
    }

    async fn upload_resumes(&self, job_id: &str, files: &[ResumeFile]) -> ApiResult<ResumeUpload> {
        if files.is_empty() {
            return Err(ApiError::Validation("at least one resume file is required".into()));
        }

        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.content.clone())
                .file_name(file.filename.clone())
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }

        let request = self
            .request(Method::POST, &[Lit("jobs"), Id(job_id), Lit("resumes")])
            .multipart(form);
        let upload: ResumeUpload = Self::send_raw(request).await?;
        tracing::info!(
            job_id = %job_id,
            uploaded = upload.resumes_uploaded,
            total = upload.total_files,
            "Submitted resumes for screening"
        );
        Ok(upload)
    }

    async fn generate_interview_link(&self, candidate_id: &str) -> ApiResult<InterviewLink> {
        let request = self.request(
            Method::POST,
            &[Lit("candidates"), Id(candidate_id), Lit("generate-interview-link")],
        );
        let link: InterviewLink = Self::send_envelope(request).await?;
        tracing::info!(candidate_id = %candidate_id, session_id = %link.session_id, "Generated interview link");
        Ok(link)
    }

    async fn get_interview_session(&self, session_id: &str) -> ApiResult<SessionView> {
        Self::send_envelope(self.request(Method::GET, &[Lit("interviews"), Id(session_id)])).await
    }

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> ApiResult<InterviewSession> {
        let request = self
            .request(Method::PATCH, &[Lit("interviews"), Id(session_id), Lit("status")])
            .json(&json!({ "status": status }));
        Self::send_envelope(request).await
    }

    async fn update_session_conversation(
        &self,
        session_id: &str,
        conversation_id: &str,
    ) -> ApiResult<InterviewSession> {
        if conversation_id.trim().is_empty() {
            return Err(ApiError::Validation("conversation id is required".into()));
        }
        let request = self
            .request(
                Method::PATCH,
                &[Lit("interviews"), Id(session_id), Lit("update-conversation")],
            )
            .json(&json!({ "conversation_id": conversation_id }));
        Self::send_envelope(request).await
    }

    async fn complete_with_transcript(
        &self,
        session_id: &str,
        submission: &TranscriptSubmission,
    ) -> ApiResult<InterviewResult> {
        submission.validate()?;
        let request = self
            .request(
                Method::POST,
                &[Lit("interviews"), Id(session_id), Lit("complete-with-transcript")],
            )
            .json(submission);
        let result: InterviewResult = Self::send_envelope(request).await?;
        tracing::info!(
            session_id = %session_id,
            overall_score = ?result.overall_score,
            has_recording = submission.recording_url.is_some(),
            "Interview transcript submitted"
        );
        Ok(result)
    }

    async fn get_transcript(&self, session_id: &str) -> ApiResult<StoredTranscript> {
        Self::send_envelope(self.request(
            Method::GET,
            &[Lit("interviews"), Id(session_id), Lit("transcript")],
        ))
        .await
    }

    async fn reanalyze_transcript(
        &self,
        session_id: &str,
        reason: Option<&str>,
    ) -> ApiResult<InterviewResult> {
        let mut body = json!({ "session_id": session_id });
        if let Some(reason) = reason {
            body["reason"] = json!(reason);
        }
        let request = self
            .request(
                Method::POST,
                &[Lit("interviews"), Lit("analyze-stored-transcript")],
            )
            .json(&body);
        Self::send_envelope(request).await
    }

    async fn reanalyze_all(&self) -> ApiResult<ReanalysisSummary> {
        let request = self.request(Method::POST, &[Lit("interviews"), Lit("reanalyze-all")]);
        let response: ReanalyzeAllResponse = Self::send_raw(request).await?;
        match response.status {
            EnvelopeStatus::Success => {
                tracing::info!(
                    successful = response.successful,
                    failed = response.failed,
                    "Re-analysed stored interviews"
                );
                Ok(ReanalysisSummary {
                    successful: response.successful,
                    failed: response.failed,
                    message: response.message,
                })
            }
            EnvelopeStatus::Error => Err(ApiError::Remote(
                response
                    .error
                    .or(response.message)
                    .unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }

    async fn get_interview_results(&self, session_id: &str) -> ApiResult<InterviewResult> {
        Self::send_envelope(self.request(
            Method::GET,
            &[Lit("interviews"), Id(session_id), Lit("results")],
        ))
        .await
    }

    async fn list_job_interview_results(&self, job_id: &str) -> ApiResult<Vec<InterviewResult>> {
        Self::send_envelope(self.request(
            Method::GET,
            &[Lit("jobs"), Id(job_id), Lit("interview-results")],
        ))
        .await
    }
}
