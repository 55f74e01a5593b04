//! Cache keys for dashboard queries
//!
//! Everything about one job lives under `["job", id]` and everything about one
//! interview session under `["session", id]`, so a write can drop all of it
//! with a single prefix.

use crate::cache::QueryKey;

pub fn jobs() -> QueryKey {
    QueryKey::new(["jobs"])
}

pub fn job(job_id: &str) -> QueryKey {
    QueryKey::new(["job", job_id])
}

/// Prefix of every resume page of a job
pub fn job_resumes(job_id: &str) -> QueryKey {
    job(job_id).child("resumes")
}

pub fn resumes(job_id: &str, filter: &str) -> QueryKey {
    job_resumes(job_id).child(filter)
}

pub fn setups(job_id: &str) -> QueryKey {
    job(job_id).child("setups")
}

pub fn setup_matrix(job_id: &str) -> QueryKey {
    job(job_id).child("setup-matrix")
}

pub fn interview_results(job_id: &str) -> QueryKey {
    job(job_id).child("interview-results")
}

pub fn candidate_sessions(resume_result_id: &str) -> QueryKey {
    QueryKey::new(["candidate", resume_result_id, "sessions"])
}

pub fn session(session_id: &str) -> QueryKey {
    QueryKey::new(["session", session_id])
}

pub fn session_result(session_id: &str) -> QueryKey {
    session(session_id).child("result")
}

pub fn transcript(session_id: &str) -> QueryKey {
    session(session_id).child("transcript")
}
