//! Data access
//!
//! Typed repositories over a remote relational store. The store itself is
//! behind [`RecordStore`] so the HTTP backend and the in-memory backend are
//! interchangeable.

pub mod interviews;
pub mod jobs;
pub mod memory;
pub mod postgrest;
pub mod records;
pub mod resumes;
pub mod setups;

pub use interviews::InterviewRepository;
pub use jobs::JobRepository;
pub use memory::InMemoryStore;
pub use postgrest::PostgrestStore;
pub use resumes::ResumeRepository;
pub use setups::InterviewSetupRepository;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Store-related errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{table} record not found: {key}")]
    NotFound { table: Table, key: String },

    #[error("{count} {table} records match {key}, expected exactly one")]
    Ambiguous {
        table: Table,
        key: String,
        count: usize,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode record: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn not_found(table: Table, key: impl Into<String>) -> Self {
        Self::NotFound {
            table,
            key: key.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Tables of the screening backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    JobPosts,
    ResumeResults,
    InterviewSetup,
    InterviewSessions,
    InterviewResults,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JobPosts => "job_posts",
            Self::ResumeResults => "resume_results",
            Self::InterviewSetup => "interview_setup",
            Self::InterviewSessions => "interview_sessions",
            Self::InterviewResults => "interview_results",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single row predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    IsNull(String),
    NotNull(String),
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Row selection: filters are AND-ed together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.to_string(), value.into()));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::NotNull(column.to_string()));
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Human-readable description of the filters, for error messages
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .filters
            .iter()
            .map(|f| match f {
                Filter::Eq(c, v) => format!("{c}={}", value_text(v)),
                Filter::Gte(c, v) => format!("{c}>={}", value_text(v)),
                Filter::IsNull(c) => format!("{c} is null"),
                Filter::NotNull(c) => format!("{c} is not null"),
            })
            .collect();
        parts.join(", ")
    }
}

/// Render a filter value the way it appears in a query string
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Row-level access to a relational backend
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(&self, table: Table, query: &Query) -> StoreResult<Vec<Value>>;

    /// Insert rows, returning them as stored
    async fn insert(&self, table: Table, rows: Vec<Value>) -> StoreResult<Vec<Value>>;

    /// Merge `patch` into every matching row, returning the updated rows
    async fn update(&self, table: Table, query: &Query, patch: Value) -> StoreResult<Vec<Value>>;

    /// Delete matching rows, returning them
    async fn delete(&self, table: Table, query: &Query) -> StoreResult<Vec<Value>>;
}

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> StoreResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(StoreError::from))
        .collect()
}

/// Exactly one row, or a not-found / ambiguity error
pub(crate) fn decode_single<T: DeserializeOwned>(
    table: Table,
    query: &Query,
    mut rows: Vec<Value>,
) -> StoreResult<T> {
    match rows.len() {
        0 => Err(StoreError::not_found(table, query.describe())),
        1 => Ok(serde_json::from_value(rows.remove(0))?),
        count => Err(StoreError::Ambiguous {
            table,
            key: query.describe(),
            count,
        }),
    }
}

/// Current time in the format the store uses for timestamps
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
