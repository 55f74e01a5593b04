//! Query cache
//!
//! Keeps the last result of each read keyed by a [`QueryKey`]. Entries are
//! served from memory while fresh and refetched once stale; writes drop the
//! keys they affect by prefix.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);

/// Hierarchical cache key, e.g. `["jobs", "<id>", "resumes"]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// This key with one more segment appended
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    updated_at: Instant,
}

#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, Entry>>>,
    stale_time: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIME)
    }
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            stale_time,
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    /// Cached value for `key` if present, fresh and of type `T`
    pub fn get<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.updated_at.elapsed() >= self.stale_time {
            return None;
        }
        entry.value.downcast_ref::<T>().cloned()
    }

    /// Fresh cached value, or the fetcher's result (which is then cached)
    ///
    /// Failed fetches are not cached and leave any previous entry in place.
    pub async fn fetch<T, E, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(&key) {
            tracing::trace!(key = %key, "cache hit");
            return Ok(value);
        }
        tracing::debug!(key = %key, "cache miss");
        let value = fetcher().await?;
        self.set_query_data(key, value.clone());
        Ok(value)
    }

    /// Write a value directly, e.g. an optimistic update
    pub fn set_query_data<T>(&self, key: QueryKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.entries.lock().insert(
            key,
            Entry {
                value: Arc::new(value),
                updated_at: Instant::now(),
            },
        );
    }

    /// Cached value regardless of staleness
    pub fn peek<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.entries.lock().get(key)?.value.downcast_ref::<T>().cloned()
    }

    pub fn remove(&self, key: &QueryKey) {
        self.entries.lock().remove(key);
    }

    /// Drop every entry whose key starts with `prefix`, returning how many
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(prefix = %prefix, removed, "invalidated queries");
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
