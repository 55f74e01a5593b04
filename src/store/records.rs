//! Record types stored by the screening backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::StoreError;

/// Candidate category assigned by resume classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateType {
    Tech,
    NonTech,
    SemiTech,
}

impl CandidateType {
    pub const ALL: [CandidateType; 3] = [Self::Tech, Self::NonTech, Self::SemiTech];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tech => "tech",
            Self::NonTech => "non-tech",
            Self::SemiTech => "semi-tech",
        }
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seniority assigned by resume classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateLevel {
    Entry,
    Mid,
    Senior,
}

impl CandidateLevel {
    pub const ALL: [CandidateLevel; 3] = [Self::Entry, Self::Mid, Self::Senior];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Mid => "mid",
            Self::Senior => "senior",
        }
    }
}

impl fmt::Display for CandidateLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job posts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Active,
    Closed,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPost {
    pub id: String,
    pub job_role: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub required_experience: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub job_description_analysis: Option<Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for a new job posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJobPost {
    pub job_role: String,
    pub required_experience: String,
    pub job_description: String,
}

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), StoreError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(StoreError::Validation(format!(
            "{field} must be between {min} and {max} characters, got {len}"
        )));
    }
    Ok(())
}

impl NewJobPost {
    pub fn validate(&self) -> Result<(), StoreError> {
        check_length("job_role", &self.job_role, 1, 255)?;
        check_length("required_experience", &self.required_experience, 1, 100)?;
        check_length("job_description", &self.job_description, 10, 10_000)
    }
}

/// Partial update of a job posting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

impl JobUpdate {
    pub fn is_empty(&self) -> bool {
        self.job_role.is_none()
            && self.required_experience.is_none()
            && self.job_description.is_none()
            && self.status.is_none()
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.is_empty() {
            return Err(StoreError::Validation("job update has no fields set".into()));
        }
        if let Some(role) = &self.job_role {
            check_length("job_role", role, 1, 255)?;
        }
        if let Some(experience) = &self.required_experience {
            check_length("required_experience", experience, 1, 100)?;
        }
        if let Some(description) = &self.job_description {
            check_length("job_description", description, 10, 10_000)?;
        }
        Ok(())
    }

    /// Apply the update to a local copy, as the store would
    pub fn apply_to(&self, job: &mut JobPost) {
        if let Some(role) = &self.job_role {
            job.job_role = role.clone();
        }
        if let Some(experience) = &self.required_experience {
            job.required_experience = experience.clone();
        }
        if let Some(description) = &self.job_description {
            job.job_description = description.clone();
        }
        if let Some(status) = self.status {
            job.status = status;
        }
    }
}

// ---------------------------------------------------------------------------
// Resume results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeResult {
    pub id: String,
    pub job_post_id: String,
    pub candidate_name: String,
    pub candidate_type: CandidateType,
    pub candidate_level: CandidateLevel,
    pub fit_score: i64,
    #[serde(default)]
    pub matching_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub detailed_feedback: Option<String>,
    #[serde(default)]
    pub resume_analysis_data: Option<Value>,
    #[serde(default)]
    pub resume_file_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Interview setup
// ---------------------------------------------------------------------------

fn default_number_of_questions() -> u32 {
    7
}

fn default_estimated_duration() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSetup {
    pub id: String,
    pub job_post_id: String,
    pub role_type: CandidateType,
    pub level: CandidateLevel,
    #[serde(default)]
    pub experience_range: Option<String>,
    pub screening_percentage: u32,
    pub domain_percentage: u32,
    pub behavioral_attitude_percentage: u32,
    #[serde(default)]
    pub communication_percentage: u32,
    #[serde(default = "default_number_of_questions")]
    pub number_of_questions: u32,
    /// Minutes
    #[serde(default = "default_estimated_duration")]
    pub estimated_duration: u32,
    #[serde(default)]
    pub fixed_questions_mode: Option<bool>,
    #[serde(default)]
    pub fixed_questions: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl InterviewSetup {
    /// Fixed questions are used unless the setup explicitly turns them off
    pub fn uses_fixed_questions(&self) -> bool {
        self.fixed_questions_mode.unwrap_or(true)
    }

    pub fn percentages(&self) -> InterviewPercentages {
        InterviewPercentages {
            screening: self.screening_percentage,
            domain: self.domain_percentage,
            behavioral: self.behavioral_attitude_percentage,
        }
    }
}

/// Weighting of the three interview sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewPercentages {
    pub screening: u32,
    pub domain: u32,
    pub behavioral: u32,
}

impl InterviewPercentages {
    pub fn new(screening: u32, domain: u32, behavioral: u32) -> Self {
        Self {
            screening,
            domain,
            behavioral,
        }
    }

    pub fn total(&self) -> u64 {
        u64::from(self.screening) + u64::from(self.domain) + u64::from(self.behavioral)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        for (name, value) in [
            ("screening", self.screening),
            ("domain", self.domain),
            ("behavioral", self.behavioral),
        ] {
            if value > 100 {
                return Err(StoreError::Validation(format!(
                    "{name} percentage must be between 0 and 100, got {value}"
                )));
            }
        }
        let total = self.total();
        if total != 100 {
            return Err(StoreError::Validation(format!(
                "Interview percentages must sum to 100, got {total}"
            )));
        }
        Ok(())
    }
}

/// Input for a new interview setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInterviewSetup {
    pub role_type: CandidateType,
    pub level: CandidateLevel,
    pub experience_range: String,
    pub percentages: InterviewPercentages,
    #[serde(default)]
    pub number_of_questions: Option<u32>,
    #[serde(default)]
    pub estimated_duration: Option<u32>,
    #[serde(default)]
    pub fixed_questions_mode: Option<bool>,
    #[serde(default)]
    pub fixed_questions: Vec<String>,
}

impl NewInterviewSetup {
    pub fn validate(&self) -> Result<(), StoreError> {
        self.percentages.validate().map_err(|err| match err {
            StoreError::Validation(message) => StoreError::Validation(format!(
                "{}-{}: {message}",
                self.role_type, self.level
            )),
            other => other,
        })?;
        if self.experience_range.trim().is_empty() {
            return Err(StoreError::Validation(format!(
                "{}-{}: experience_range is required",
                self.role_type, self.level
            )));
        }
        if self.number_of_questions == Some(0) {
            return Err(StoreError::Validation("number_of_questions must be positive".into()));
        }
        if self.estimated_duration == Some(0) {
            return Err(StoreError::Validation("estimated_duration must be positive".into()));
        }
        Ok(())
    }

    /// Row to insert for `job_post_id`
    pub(crate) fn to_row(&self, job_post_id: &str, now: &str) -> Value {
        serde_json::json!({
            "job_post_id": job_post_id,
            "role_type": self.role_type,
            "level": self.level,
            "experience_range": self.experience_range,
            "screening_percentage": self.percentages.screening,
            "domain_percentage": self.percentages.domain,
            "behavioral_attitude_percentage": self.percentages.behavioral,
            // communication is assessed from the answers themselves
            "communication_percentage": 0,
            "number_of_questions": self.number_of_questions.unwrap_or_else(default_number_of_questions),
            "estimated_duration": self.estimated_duration.unwrap_or_else(default_estimated_duration),
            "fixed_questions_mode": self.fixed_questions_mode.unwrap_or(true),
            "fixed_questions": self.fixed_questions,
            "is_active": true,
            "created_at": now,
            "updated_at": now,
        })
    }
}

/// Partial update of an interview setup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterviewSetupUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screening_percentage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_percentage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavioral_attitude_percentage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_questions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_questions_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_questions: Option<Vec<String>>,
}

impl InterviewSetupUpdate {
    pub fn percentages(percentages: InterviewPercentages) -> Self {
        Self {
            screening_percentage: Some(percentages.screening),
            domain_percentage: Some(percentages.domain),
            behavioral_attitude_percentage: Some(percentages.behavioral),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn touches_percentages(&self) -> bool {
        self.screening_percentage.is_some()
            || self.domain_percentage.is_some()
            || self.behavioral_attitude_percentage.is_some()
    }

    /// All three percentages, if the update sets all of them
    pub fn full_percentages(&self) -> Option<InterviewPercentages> {
        Some(InterviewPercentages {
            screening: self.screening_percentage?,
            domain: self.domain_percentage?,
            behavioral: self.behavioral_attitude_percentage?,
        })
    }

    /// Percentages after applying this update on top of `current`
    pub fn merged_percentages(&self, current: InterviewPercentages) -> InterviewPercentages {
        InterviewPercentages {
            screening: self.screening_percentage.unwrap_or(current.screening),
            domain: self.domain_percentage.unwrap_or(current.domain),
            behavioral: self.behavioral_attitude_percentage.unwrap_or(current.behavioral),
        }
    }

    /// Checks that need no stored record
    pub fn validate_shape(&self) -> Result<(), StoreError> {
        if self.is_empty() {
            return Err(StoreError::Validation("interview setup update has no fields set".into()));
        }
        if let Some(percentages) = self.full_percentages() {
            percentages.validate()?;
        }
        if self.number_of_questions == Some(0) {
            return Err(StoreError::Validation("number_of_questions must be positive".into()));
        }
        if self.estimated_duration == Some(0) {
            return Err(StoreError::Validation("estimated_duration must be positive".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Interview sessions and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: String,
    pub resume_result_id: String,
    pub job_post_id: String,
    #[serde(default)]
    pub candidate_name: Option<String>,
    #[serde(default)]
    pub generated_questions: Option<Value>,
    #[serde(default)]
    pub interview_prompt: Option<String>,
    #[serde(default)]
    pub session_url: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl InterviewSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Expired || self.expires_at.is_some_and(|at| now > at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

/// One utterance in an interview transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Integrity signals captured during an interview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityViolations {
    #[serde(default)]
    pub cheating_flags: Vec<String>,
    #[serde(default)]
    pub fullscreen_exit_count: u32,
    #[serde(default)]
    pub security_score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewResult {
    pub id: String,
    pub interview_session_id: String,
    #[serde(default)]
    pub job_post_id: Option<String>,
    #[serde(default)]
    pub resume_result_id: Option<String>,
    #[serde(default)]
    pub candidate_name: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub transcript_entries: Vec<TranscriptEntry>,
    #[serde(default)]
    pub transcript_source: Option<String>,
    #[serde(default)]
    pub security_violations: Option<SecurityViolations>,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub domain_score: Option<f64>,
    #[serde(default)]
    pub behavioral_score: Option<f64>,
    #[serde(default)]
    pub communication_score: Option<f64>,
    #[serde(default)]
    pub cheating_detected: Option<bool>,
    #[serde(default)]
    pub raw_analysis: Option<Value>,
    /// Analysis fields without a dedicated column here
    #[serde(flatten)]
    pub analysis: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup_json() -> Value {
        json!({
            "id": "s1",
            "job_post_id": "j1",
            "role_type": "semi-tech",
            "level": "mid",
            "screening_percentage": 30,
            "domain_percentage": 50,
            "behavioral_attitude_percentage": 20
        })
    }

    #[test]
    fn test_setup_defaults() {
        let setup: InterviewSetup = serde_json::from_value(setup_json()).unwrap();
        assert_eq!(setup.role_type, CandidateType::SemiTech);
        assert_eq!(setup.number_of_questions, 7);
        assert_eq!(setup.estimated_duration, 10);
        assert!(setup.is_active);
        assert!(setup.uses_fixed_questions());
    }

    #[test]
    fn test_explicit_false_fixed_questions_mode_is_kept() {
        let mut value = setup_json();
        value["fixed_questions_mode"] = json!(false);
        let setup: InterviewSetup = serde_json::from_value(value).unwrap();
        assert!(!setup.uses_fixed_questions());
    }

    #[test]
    fn test_percentages_must_sum_to_100() {
        let err = InterviewPercentages::new(40, 40, 10).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: Interview percentages must sum to 100, got 90"
        );
        assert!(InterviewPercentages::new(40, 40, 20).validate().is_ok());
    }

    #[test]
    fn test_percentages_out_of_range() {
        let err = InterviewPercentages::new(u32::MAX, 101, 0).validate().unwrap_err();
        assert!(err.to_string().contains("screening percentage must be between 0 and 100"));

        // Sums to 100 only if the addition wraps.
        let wrapping = InterviewPercentages::new(u32::MAX - 100, 101, 100);
        assert!(wrapping.validate().is_err());
        assert_eq!(wrapping.total(), u64::from(u32::MAX) + 101);

        let err = InterviewPercentages::new(0, 150, 0).validate().unwrap_err();
        assert!(err.to_string().contains("domain percentage"));
    }

    #[test]
    fn test_new_job_validation() {
        let job = NewJobPost {
            job_role: "Backend Engineer".into(),
            required_experience: "3-5 years".into(),
            job_description: "short".into(),
        };
        assert!(job.validate().is_err());

        let job = NewJobPost {
            job_description: "Build and operate APIs.".into(),
            ..job
        };
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_job_update_skips_unset_fields() {
        let update = JobUpdate {
            status: Some(JobStatus::Closed),
            ..JobUpdate::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"status": "closed"}));
        assert!(JobUpdate::default().validate().is_err());
    }

    #[test]
    fn test_setup_update_merges_percentages() {
        let update = InterviewSetupUpdate {
            domain_percentage: Some(60),
            ..InterviewSetupUpdate::default()
        };
        assert!(update.touches_percentages());
        assert_eq!(update.full_percentages(), None);
        let merged = update.merged_percentages(InterviewPercentages::new(30, 50, 20));
        assert_eq!(merged.total(), 110);
    }

    #[test]
    fn test_interview_result_keeps_extra_analysis() {
        let result: InterviewResult = serde_json::from_value(json!({
            "id": "r1",
            "interview_session_id": "s1",
            "overall_score": 78,
            "strengths": ["clear answers"],
            "security_violations": {"cheating_flags": ["tab-switch"], "fullscreen_exit_count": 1}
        }))
        .unwrap();
        assert_eq!(result.overall_score, Some(78.0));
        assert_eq!(result.analysis["strengths"], json!(["clear answers"]));
        assert_eq!(result.security_violations.unwrap().fullscreen_exit_count, 1);
    }

    #[test]
    fn test_session_expiry() {
        let session: InterviewSession = serde_json::from_value(json!({
            "id": "s",
            "resume_result_id": "r",
            "job_post_id": "j",
            "expires_at": "2026-01-02T00:00:00Z"
        }))
        .unwrap();
        let before = "2026-01-01T00:00:00Z".parse().unwrap();
        let after = "2026-01-03T00:00:00Z".parse().unwrap();
        assert!(!session.is_expired_at(before));
        assert!(session.is_expired_at(after));
    }
}
