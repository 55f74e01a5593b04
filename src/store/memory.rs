//! In-memory store
//!
//! Same contract as the remote store, kept in process. Used for tests and
//! offline runs; data is lost when the store is dropped.

use super::{now_timestamp, Direction, Filter, Query, RecordStore, StoreError, StoreResult, Table};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<Table, Vec<Map<String, Value>>>>,
    calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently in a table
    pub fn row_count(&self, table: Table) -> usize {
        self.tables.read().get(&table).map_or(0, Vec::len)
    }

    /// Number of store operations issued so far
    pub fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

fn matches(row: &Map<String, Value>, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => row.get(column).is_some_and(|v| values_equal(v, value)),
        Filter::Gte(column, value) => row
            .get(column)
            .is_some_and(|v| compare_values(v, value) != Ordering::Less),
        Filter::IsNull(column) => row.get(column).map_or(true, Value::is_null),
        Filter::NotNull(column) => row.get(column).is_some_and(|v| !v.is_null()),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        // nulls sort last, as in Postgres
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

fn select_rows<'a>(rows: &'a [Map<String, Value>], query: &Query) -> Vec<&'a Map<String, Value>> {
    let mut selected: Vec<_> = rows
        .iter()
        .filter(|row| query.filters.iter().all(|f| matches(row, f)))
        .collect();

    if let Some((column, direction)) = &query.order {
        selected.sort_by(|a, b| {
            let ordering = compare_values(
                a.get(column).unwrap_or(&Value::Null),
                b.get(column).unwrap_or(&Value::Null),
            );
            match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });
    }

    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(usize::MAX);
    selected.into_iter().skip(offset).take(limit).collect()
}

fn into_object(value: Value) -> StoreResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Validation(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn select(&self, table: Table, query: &Query) -> StoreResult<Vec<Value>> {
        self.record_call();
        let tables = self.tables.read();
        let rows = tables.get(&table).map(Vec::as_slice).unwrap_or_default();
        Ok(select_rows(rows, query)
            .into_iter()
            .map(|row| Value::Object(row.clone()))
            .collect())
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
        self.record_call();
        let now = now_timestamp();
        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = into_object(row)?;
            row.entry("id")
                .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
            row.entry("created_at")
                .or_insert_with(|| Value::String(now.clone()));
            row.entry("updated_at")
                .or_insert_with(|| Value::String(now.clone()));
            prepared.push(row);
        }

        let mut tables = self.tables.write();
        let existing = tables.entry(table).or_default();
        for (i, row) in prepared.iter().enumerate() {
            let id = row.get("id");
            if existing.iter().chain(&prepared[..i]).any(|r| r.get("id") == id) {
                return Err(StoreError::Status {
                    status: 409,
                    message: format!("duplicate key in {table}"),
                });
            }
        }
        existing.extend(prepared.iter().cloned());
        Ok(prepared.into_iter().map(Value::Object).collect())
    }

    async fn update(&self, table: Table, query: &Query, patch: Value) -> StoreResult<Vec<Value>> {
        self.record_call();
        let patch = into_object(patch)?;
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows
            .iter_mut()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
        {
            for (key, value) in &patch {
                row.insert(key.clone(), value.clone());
            }
            updated.push(Value::Object(row.clone()));
        }
        Ok(updated)
    }

    async fn delete(&self, table: Table, query: &Query) -> StoreResult<Vec<Value>> {
        self.record_call();
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(Vec::new());
        };

        let (removed, kept): (Vec<_>, Vec<_>) = rows
            .drain(..)
            .partition(|row| query.filters.iter().all(|f| matches(row, f)));
        *rows = kept;
        Ok(removed.into_iter().map(Value::Object).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let store = InMemoryStore::new();
        let rows = store
            .insert(Table::JobPosts, vec![json!({"job_role": "Engineer"})])
            .await
            .unwrap();
        assert!(rows[0]["id"].is_string());
        assert!(rows[0]["created_at"].is_string());
        assert_eq!(store.row_count(Table::JobPosts), 1);
        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = InMemoryStore::new();
        store.insert(Table::JobPosts, vec![json!({"id": "a"})]).await.unwrap();
        let err = store
            .insert(Table::JobPosts, vec![json!({"id": "a"})])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_duplicate_id_within_batch_is_rejected() {
        let store = InMemoryStore::new();
        let err = store
            .insert(Table::JobPosts, vec![json!({"id": "b"}), json!({"id": "b"})])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 409, .. }));
        assert_eq!(store.row_count(Table::JobPosts), 0);
    }

    #[tokio::test]
    async fn test_filters_order_and_pagination() {
        let store = InMemoryStore::new();
        let rows = (0..5)
            .map(|i| json!({"job_post_id": "j", "fit_score": i * 20}))
            .chain(std::iter::once(json!({"job_post_id": "other", "fit_score": 100})))
            .collect();
        store.insert(Table::ResumeResults, rows).await.unwrap();

        let query = Query::new()
            .eq("job_post_id", "j")
            .gte("fit_score", 40)
            .order("fit_score", Direction::Desc)
            .limit(2);
        let rows = store.select(Table::ResumeResults, &query).await.unwrap();
        let scores: Vec<i64> = rows.iter().map(|r| r["fit_score"].as_i64().unwrap()).collect();
        assert_eq!(scores, vec![80, 60]);

        let page = store
            .select(Table::ResumeResults, &query.clone().offset(2))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["fit_score"], 40);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = InMemoryStore::new();
        store
            .insert(
                Table::InterviewSetup,
                vec![
                    json!({"id": "a", "job_post_id": "j", "is_active": true}),
                    json!({"id": "b", "job_post_id": "j", "is_active": true}),
                ],
            )
            .await
            .unwrap();

        let updated = store
            .update(
                Table::InterviewSetup,
                &Query::new().eq("job_post_id", "j"),
                json!({"is_active": false}),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);
        let active = store
            .select(Table::InterviewSetup, &Query::new().eq("is_active", true))
            .await
            .unwrap();
        assert!(active.is_empty());

        let removed = store
            .delete(Table::InterviewSetup, &Query::new().eq("id", "a"))
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(store.row_count(Table::InterviewSetup), 1);
    }

    #[tokio::test]
    async fn test_null_filters() {
        let store = InMemoryStore::new();
        store
            .insert(
                Table::InterviewResults,
                vec![json!({"transcript": null}), json!({"transcript": "USER: hi"})],
            )
            .await
            .unwrap();
        let with = store
            .select(Table::InterviewResults, &Query::new().not_null("transcript"))
            .await
            .unwrap();
        let without = store
            .select(Table::InterviewResults, &Query::new().is_null("transcript"))
            .await
            .unwrap();
        assert_eq!(with.len(), 1);
        assert_eq!(without.len(), 1);
    }
}
