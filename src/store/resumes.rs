//! Resume screening results

use super::records::{CandidateLevel, CandidateType, ResumeResult};
use super::{decode_rows, decode_single, Direction, Query, RecordStore, StoreResult, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Counts of results per category and level
pub type ClassificationSummary = BTreeMap<CandidateType, BTreeMap<CandidateLevel, usize>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeFilter {
    pub min_score: Option<i64>,
    pub category: Option<CandidateType>,
    pub level: Option<CandidateLevel>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ResumeFilter {
    fn default() -> Self {
        Self {
            min_score: None,
            category: None,
            level: None,
            limit: 100,
            offset: 0,
        }
    }
}

/// One page of results plus totals over every match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumePage {
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub classification_summary: ClassificationSummary,
    pub results: Vec<ResumeResult>,
}

fn summarize(results: &[ResumeResult]) -> ClassificationSummary {
    let mut summary = ClassificationSummary::new();
    for result in results {
        *summary
            .entry(result.candidate_type)
            .or_default()
            .entry(result.candidate_level)
            .or_default() += 1;
    }
    summary
}

#[derive(Clone)]
pub struct ResumeRepository {
    store: Arc<dyn RecordStore>,
}

impl ResumeRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Results for a job, best fit first
    ///
    /// The summary and total cover every match; only `results` is paginated.
    pub async fn list_for_job(&self, job_id: &str, filter: &ResumeFilter) -> StoreResult<ResumePage> {
        let mut query = Query::new().eq("job_post_id", job_id);
        if let Some(min_score) = filter.min_score {
            query = query.gte("fit_score", min_score);
        }
        if let Some(category) = filter.category {
            query = query.eq("candidate_type", category.as_str());
        }
        if let Some(level) = filter.level {
            query = query.eq("candidate_level", level.as_str());
        }
        query = query.order("fit_score", Direction::Desc);

        let all: Vec<ResumeResult> = decode_rows(self.store.select(Table::ResumeResults, &query).await?)?;
        tracing::debug!(job_id = %job_id, matches = all.len(), "Loaded resume results");

        let classification_summary = summarize(&all);
        let total = all.len();
        let results = all
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect();

        Ok(ResumePage {
            total,
            offset: filter.offset,
            limit: filter.limit,
            classification_summary,
            results,
        })
    }

    pub async fn get(&self, id: &str) -> StoreResult<ResumeResult> {
        let query = Query::new().eq("id", id);
        let rows = self.store.select(Table::ResumeResults, &query).await?;
        decode_single(Table::ResumeResults, &query, rows)
    }

    pub async fn list_for_candidate_type(
        &self,
        job_id: &str,
        candidate_type: CandidateType,
    ) -> StoreResult<Vec<ResumeResult>> {
        let query = Query::new()
            .eq("job_post_id", job_id)
            .eq("candidate_type", candidate_type.as_str())
            .order("fit_score", Direction::Desc);
        decode_rows(self.store.select(Table::ResumeResults, &query).await?)
    }
}
