#![allow(dead_code)]

use anyhow::Result;
use sea_jobs::config::Settings;
use sea_jobs::db::{self, Pool};
use sea_jobs::ingest::Ingestor;
use sea_jobs::sanitize::RawJob;
use sea_jobs::source::{JobSource, SearchRequest};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn setup_pool() -> Pool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::ensure_schema(&pool).await.unwrap();
    pool
}

/// Defaults with every pause set to zero.
pub fn test_settings(log_dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.logging.path = log_dir.display().to_string();
    settings.throttle.batch_delay = 0;
    settings.throttle.site_delay = 0;
    settings.throttle.country_delay = 0;
    settings.throttle.batch_size = 2;
    settings
}

pub fn raw(value: Value) -> RawJob {
    value.as_object().cloned().unwrap()
}

pub fn job(url: &str, title: &str, location: &str) -> RawJob {
    raw(json!({
        "site": "indeed",
        "job_url": url,
        "title": title,
        "company": "Acme",
        "location": location,
    }))
}

#[derive(Clone, Default)]
pub struct RecordingSource {
    responses: Arc<Mutex<VecDeque<Result<Vec<RawJob>>>>>,
    fallback: Vec<RawJob>,
    calls: Arc<Mutex<Vec<SearchRequest>>>,
}

impl RecordingSource {
    pub fn with_responses(responses: Vec<Result<Vec<RawJob>>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    /// Returned once the queued responses run out.
    pub fn with_fallback(fallback: Vec<RawJob>) -> Self {
        Self {
            fallback,
            ..Default::default()
        }
    }

    pub async fn calls(&self) -> Vec<SearchRequest> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl JobSource for RecordingSource {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawJob>> {
        self.calls.lock().await.push(request.clone());
        let mut guard = self.responses.lock().await;
        guard.pop_front().unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

pub fn ingestor(pool: &Pool, source: &RecordingSource, settings: Settings) -> Ingestor {
    Ingestor::new(pool.clone(), Arc::new(source.clone()), Arc::new(settings))
}
