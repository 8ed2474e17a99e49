//! HTTP surface over the job store and the scrape queue.
mod error;
pub mod jobs;
pub mod scrape;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

use crate::config::Settings;
use crate::db::Pool;
use crate::worker::ScrapeQueue;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub settings: Arc<Settings>,
    pub queue: ScrapeQueue,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/stats", get(jobs::job_stats))
        .route("/jobs/filters", get(jobs::filter_options))
        .route("/health", get(jobs::health))
        .route("/scrape", post(scrape::trigger_scrape))
        .route("/scrape/:id", get(scrape::scrape_status))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until ctrl-c.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    info!(addr = %listener.local_addr()?, "api listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("api server error")?;
    Ok(())
}
