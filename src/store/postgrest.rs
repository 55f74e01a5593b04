//! PostgREST-backed store
//!
//! Talks to a hosted Postgres through its REST gateway:
//! `GET/POST/PATCH/DELETE {url}/rest/v1/{table}?column=op.value`.

use super::{value_text, Direction, Filter, Query, RecordStore, StoreError, StoreResult, Table};
use crate::config::StoreConfig;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;

/// Error code PostgREST uses when a single-row request matches nothing
const NO_ROWS_CODE: &str = "PGRST116";

#[derive(Debug, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PostgrestStore {
    pub fn new(client: reqwest::Client, config: &StoreConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.anon_key.clone(),
        }
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn request(&self, method: Method, table: Table, query: &Query) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .query(&query_params(query))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
    }

    async fn rows(&self, table: Table, query: &Query, response: Response) -> StoreResult<Vec<Value>> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: Option<PostgrestError> = serde_json::from_str(&body).ok();
        if let Some(error) = &parsed {
            if error.code.as_deref() == Some(NO_ROWS_CODE) {
                return Err(StoreError::not_found(table, query.describe()));
            }
        }
        let message = parsed
            .and_then(|e| match (e.message, e.details) {
                (Some(m), Some(d)) => Some(format!("{m} ({d})")),
                (m, d) => m.or(d),
            })
            .unwrap_or(body);
        tracing::warn!(table = %table, status = status.as_u16(), "Store request failed: {}", message);
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Encode a query as PostgREST parameters
pub(crate) fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", encode_value(value))),
            Filter::Gte(column, value) => (column.clone(), format!("gte.{}", encode_value(value))),
            Filter::IsNull(column) => (column.clone(), "is.null".to_string()),
            Filter::NotNull(column) => (column.clone(), "not.is.null".to_string()),
        })
        .collect();

    if let Some((column, direction)) = &query.order {
        let direction = match direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        params.push(("order".to_string(), format!("{column}.{direction}")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(offset) = query.offset {
        params.push(("offset".to_string(), offset.to_string()));
    }
    params
}

/// PostgREST reserves `,` `.` `(` `)` inside filter values; quote those.
fn encode_value(value: &Value) -> String {
    let text = value_text(value);
    if text.contains([',', '(', ')', '"']) {
        format!("\"{}\"", text.replace('"', "\\\""))
    } else {
        text
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn select(&self, table: Table, query: &Query) -> StoreResult<Vec<Value>> {
        tracing::debug!(table = %table, filters = %query.describe(), "select");
        let response = self
            .request(Method::GET, table, query)
            .query(&[("select", "*")])
            .send()
            .await?;
        self.rows(table, query, response).await
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
        tracing::debug!(table = %table, count = rows.len(), "insert");
        let query = Query::new();
        let response = self
            .request(Method::POST, table, &query)
            .json(&rows)
            .send()
            .await?;
        self.rows(table, &query, response).await
    }

    async fn update(&self, table: Table, query: &Query, patch: Value) -> StoreResult<Vec<Value>> {
        tracing::debug!(table = %table, filters = %query.describe(), "update");
        let response = self
            .request(Method::PATCH, table, query)
            .json(&patch)
            .send()
            .await?;
        self.rows(table, query, response).await
    }

    async fn delete(&self, table: Table, query: &Query) -> StoreResult<Vec<Value>> {
        tracing::debug!(table = %table, filters = %query.describe(), "delete");
        let response = self.request(Method::DELETE, table, query).send().await?;
        self.rows(table, query, response).await
    }
}
