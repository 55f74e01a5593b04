//! Screening Dashboard - client core for resume screening and AI interviews.
//!
//! Job postings, screened candidates, interview setups and results live in a
//! hosted Postgres reached through its REST gateway; scoring and interview
//! analysis are done by a remote HTTP API. Interviews are recorded locally by
//! a [`recorder::RecordingSession`] over a [`capture::CapturePlatform`].

pub mod api;
pub mod cache;
pub mod capture;
pub mod config;
pub mod dashboard;
pub mod recorder;
pub mod store;
pub mod utils;

use api::AnalysisClient;
use cache::QueryCache;
use config::AppConfig;
use dashboard::Dashboard;
use std::sync::Arc;
use store::PostgrestStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utils::error::AppResult;

/// Install the global tracing subscriber
///
/// Filter comes from `RUST_LOG`. Calling this twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screening_dashboard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Build a dashboard talking to the configured remote services
pub fn connect(config: &AppConfig) -> AppResult<Dashboard> {
    config.validate()?;

    tracing::info!(
        "Starting Screening Dashboard v{} (store: {}, api: {})",
        env!("CARGO_PKG_VERSION"),
        config.store.url,
        config.api.base_url
    );

    let http = reqwest::Client::builder()
        .timeout(config.api.timeout())
        .build()
        .map_err(store::StoreError::from)?;
    let store = Arc::new(PostgrestStore::new(http.clone(), &config.store));
    let api = Arc::new(AnalysisClient::with_client(http, &config.api.base_url));
    let cache = QueryCache::new(config.cache.stale_time());

    Ok(Dashboard::new(store, api, cache))
}
