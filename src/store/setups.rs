//! Interview setups
//!
//! One setup per (role type, level) cell of a job's interview matrix. The
//! store does not enforce that uniqueness, so reads that fold setups into the
//! matrix report duplicates instead of hiding them.

use super::records::{
    CandidateLevel, CandidateType, InterviewPercentages, InterviewSetup, InterviewSetupUpdate,
    NewInterviewSetup,
};
use super::{
    decode_rows, decode_single, now_timestamp, Direction, Query, RecordStore, StoreError,
    StoreResult, Table,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Several active setups claiming the same matrix cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupConflict {
    pub role_type: CandidateType,
    pub level: CandidateLevel,
    /// Most recently updated first; the first one is shown in the matrix
    pub setup_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupMatrix {
    pub matrix: BTreeMap<CandidateType, BTreeMap<CandidateLevel, Option<InterviewSetup>>>,
    pub configurations: Vec<InterviewSetup>,
    pub total: usize,
    pub conflicts: Vec<SetupConflict>,
}

impl SetupMatrix {
    pub fn cell(&self, role_type: CandidateType, level: CandidateLevel) -> Option<&InterviewSetup> {
        self.matrix.get(&role_type)?.get(&level)?.as_ref()
    }

    fn build(configurations: Vec<InterviewSetup>) -> Self {
        let mut cells: BTreeMap<(CandidateType, CandidateLevel), Vec<&InterviewSetup>> =
            BTreeMap::new();
        for setup in &configurations {
            cells.entry((setup.role_type, setup.level)).or_default().push(setup);
        }

        let mut matrix: BTreeMap<CandidateType, BTreeMap<CandidateLevel, Option<InterviewSetup>>> =
            BTreeMap::new();
        for role_type in CandidateType::ALL {
            let row = matrix.entry(role_type).or_default();
            for level in CandidateLevel::ALL {
                row.insert(level, None);
            }
        }

        let mut conflicts = Vec::new();
        for ((role_type, level), mut setups) in cells {
            setups.sort_by(|a, b| last_touched(b).cmp(&last_touched(a)));
            if setups.len() > 1 {
                tracing::warn!(
                    role_type = %role_type,
                    level = %level,
                    count = setups.len(),
                    "Duplicate interview setups for one matrix cell"
                );
                conflicts.push(SetupConflict {
                    role_type,
                    level,
                    setup_ids: setups.iter().map(|s| s.id.clone()).collect(),
                });
            }
            if let Some(row) = matrix.get_mut(&role_type) {
                row.insert(level, setups.first().map(|s| (*s).clone()));
            }
        }

        Self {
            matrix,
            total: configurations.len(),
            configurations,
            conflicts,
        }
    }
}

fn last_touched(setup: &InterviewSetup) -> Option<chrono::DateTime<chrono::Utc>> {
    setup.updated_at.or(setup.created_at)
}

fn cell_query(job_id: &str, role_type: CandidateType, level: CandidateLevel) -> Query {
    Query::new()
        .eq("job_post_id", job_id)
        .eq("role_type", role_type.as_str())
        .eq("level", level.as_str())
        .eq("is_active", true)
}

/// Fields a bulk upsert rewrites on an existing setup
fn replacement_patch(config: &NewInterviewSetup, now: &str) -> Value {
    json!({
        "experience_range": config.experience_range,
        "screening_percentage": config.percentages.screening,
        "domain_percentage": config.percentages.domain,
        "behavioral_attitude_percentage": config.percentages.behavioral,
        "number_of_questions": config.number_of_questions.unwrap_or(7),
        "estimated_duration": config.estimated_duration.unwrap_or(10),
        "fixed_questions_mode": config.fixed_questions_mode.unwrap_or(true),
        "fixed_questions": config.fixed_questions,
        "updated_at": now,
    })
}

#[derive(Clone)]
pub struct InterviewSetupRepository {
    store: Arc<dyn RecordStore>,
}

impl InterviewSetupRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list_active(&self, job_id: &str) -> StoreResult<Vec<InterviewSetup>> {
        let query = Query::new()
            .eq("job_post_id", job_id)
            .eq("is_active", true)
            .order("updated_at", Direction::Desc);
        decode_rows(self.store.select(Table::InterviewSetup, &query).await?)
    }

    async fn get(&self, id: &str) -> StoreResult<InterviewSetup> {
        let query = Query::new().eq("id", id);
        let rows = self.store.select(Table::InterviewSetup, &query).await?;
        decode_single(Table::InterviewSetup, &query, rows)
    }

    /// Insert a setup without checking for an existing one in the same cell
    pub async fn create(&self, job_id: &str, config: &NewInterviewSetup) -> StoreResult<InterviewSetup> {
        config.validate()?;
        let row = config.to_row(job_id, &now_timestamp());
        let rows = self.store.insert(Table::InterviewSetup, vec![row]).await?;
        let setup: InterviewSetup = decode_single(Table::InterviewSetup, &Query::new(), rows)?;
        tracing::info!(
            job_id = %job_id,
            setup_id = %setup.id,
            cell = %format!("{}-{}", setup.role_type, setup.level),
            "Created interview setup"
        );
        Ok(setup)
    }

    /// Create or replace several setups
    ///
    /// Every config is validated before anything is written. With
    /// `replace_all` the job's active setups are deactivated first and every
    /// config is inserted. Otherwise each config updates the single active
    /// setup in its cell, or is inserted when the cell is empty; a cell that
    /// already holds several active setups fails the whole call before any
    /// write.
    pub async fn bulk_create(
        &self,
        job_id: &str,
        configs: &[NewInterviewSetup],
        replace_all: bool,
    ) -> StoreResult<Vec<InterviewSetup>> {
        for config in configs {
            config.validate()?;
        }
        let now = now_timestamp();

        if replace_all {
            let replaced = self.deactivate_all(job_id).await?;
            let rows = configs.iter().map(|c| c.to_row(job_id, &now)).collect();
            let created = decode_rows(self.store.insert(Table::InterviewSetup, rows).await?)?;
            tracing::info!(job_id = %job_id, replaced, created = configs.len(), "Replaced interview setups");
            return Ok(created);
        }

        let mut existing = Vec::with_capacity(configs.len());
        for config in configs {
            let query = cell_query(job_id, config.role_type, config.level);
            let rows = self.store.select(Table::InterviewSetup, &query).await?;
            if rows.len() > 1 {
                return Err(StoreError::Ambiguous {
                    table: Table::InterviewSetup,
                    key: query.describe(),
                    count: rows.len(),
                });
            }
            let current = decode_rows::<InterviewSetup>(rows)?.pop();
            existing.push(current.map(|setup| setup.id));
        }

        let mut saved = Vec::with_capacity(configs.len());
        let mut to_insert = Vec::new();
        for (config, existing_id) in configs.iter().zip(existing) {
            match existing_id {
                Some(id) => {
                    let query = Query::new().eq("id", id.as_str());
                    let rows = self
                        .store
                        .update(Table::InterviewSetup, &query, replacement_patch(config, &now))
                        .await?;
                    saved.push(decode_single(Table::InterviewSetup, &query, rows)?);
                }
                None => to_insert.push(config.to_row(job_id, &now)),
            }
        }
        let updated = saved.len();
        if !to_insert.is_empty() {
            let rows = self.store.insert(Table::InterviewSetup, to_insert).await?;
            saved.extend(decode_rows::<InterviewSetup>(rows)?);
        }
        tracing::info!(
            job_id = %job_id,
            updated,
            created = saved.len() - updated,
            "Saved interview setups"
        );
        Ok(saved)
    }

    pub async fn update(&self, id: &str, update: &InterviewSetupUpdate) -> StoreResult<InterviewSetup> {
        update.validate_shape()?;
        if update.touches_percentages() && update.full_percentages().is_none() {
            let current = self.get(id).await?;
            update.merged_percentages(current.percentages()).validate()?;
        }
        self.apply(id, update).await
    }

    /// Update the one active setup for a role type and level
    pub async fn update_by_role(
        &self,
        job_id: &str,
        role_type: CandidateType,
        level: CandidateLevel,
        update: &InterviewSetupUpdate,
    ) -> StoreResult<InterviewSetup> {
        update.validate_shape()?;
        let query = cell_query(job_id, role_type, level);
        let rows = self.store.select(Table::InterviewSetup, &query).await?;
        let current: InterviewSetup = decode_single(Table::InterviewSetup, &query, rows)?;
        if update.touches_percentages() {
            update.merged_percentages(current.percentages()).validate()?;
        }
        self.apply(&current.id, update).await
    }

    pub async fn update_interview_percentages(
        &self,
        id: &str,
        screening: u32,
        domain: u32,
        behavioral: u32,
    ) -> StoreResult<InterviewSetup> {
        let percentages = InterviewPercentages::new(screening, domain, behavioral);
        percentages.validate()?;
        self.apply(id, &InterviewSetupUpdate::percentages(percentages)).await
    }

    async fn apply(&self, id: &str, update: &InterviewSetupUpdate) -> StoreResult<InterviewSetup> {
        let mut patch = serde_json::to_value(update)?;
        if let Value::Object(map) = &mut patch {
            map.insert("updated_at".into(), Value::String(now_timestamp()));
        }
        let query = Query::new().eq("id", id);
        let rows = self.store.update(Table::InterviewSetup, &query, patch).await?;
        let setup = decode_single(Table::InterviewSetup, &query, rows)?;
        tracing::debug!(setup_id = %id, "Updated interview setup");
        Ok(setup)
    }

    /// Soft-delete one setup
    pub async fn deactivate(&self, id: &str) -> StoreResult<()> {
        let query = Query::new().eq("id", id);
        let patch = json!({"is_active": false, "updated_at": now_timestamp()});
        let rows = self.store.update(Table::InterviewSetup, &query, patch).await?;
        if rows.is_empty() {
            return Err(StoreError::not_found(Table::InterviewSetup, query.describe()));
        }
        Ok(())
    }

    /// Soft-delete every active setup of a job, returning how many changed
    pub async fn deactivate_all(&self, job_id: &str) -> StoreResult<usize> {
        let query = Query::new().eq("job_post_id", job_id).eq("is_active", true);
        let patch = json!({"is_active": false, "updated_at": now_timestamp()});
        let rows = self.store.update(Table::InterviewSetup, &query, patch).await?;
        Ok(rows.len())
    }

    pub async fn matrix(&self, job_id: &str) -> StoreResult<SetupMatrix> {
        Ok(SetupMatrix::build(self.list_active(job_id).await?))
    }
}
