//! Write side: queue a manual scrape and poll its task.
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState};
use crate::ingest::MAX_RESULTS_PER_SITE;
use crate::model::{ScrapeParams, ScrapeTask, Site};

const DEFAULT_LOCATION: &str = "Singapore";

#[derive(Debug, Default, Deserialize)]
pub struct ScrapeRequest {
    pub search_term: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub results: Option<u32>,
    pub sites: Option<Vec<String>>,
    pub job_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScrapeAccepted {
    pub message: &'static str,
    pub task_id: String,
    pub search_term: String,
    pub location: String,
    pub results: u32,
    pub sites: Vec<Site>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ScrapeRequest {
    /// `location` falls back to `country`, then Singapore. `results` is capped
    /// at `max_results`.
    pub fn into_params(self, default_results: u32, max_results: u32) -> Result<ScrapeParams, ApiError> {
        let search_term = non_blank(self.search_term)
            .ok_or_else(|| ApiError::bad_request("search_term is required"))?;
        let location = non_blank(self.location)
            .or_else(|| non_blank(self.country))
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        let sites = match self.sites {
            Some(names) => names
                .iter()
                .map(|name| {
                    Site::parse(name)
                        .ok_or_else(|| ApiError::bad_request(format!("unknown site {name:?}")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Site::ALL.to_vec(),
        };
        Ok(ScrapeParams {
            search_term,
            location,
            results_per_site: self
                .results
                .unwrap_or(default_results)
                .min(max_results.min(MAX_RESULTS_PER_SITE)),
            sites,
            job_type: non_blank(self.job_type),
            hours_old: None,
        })
    }
}

pub async fn trigger_scrape(
    State(state): State<AppState>,
    body: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScrapeAccepted>), ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let scraping = &state.settings.scraping;
    let params = request.into_params(
        scraping.default_results_per_site,
        scraping.max_results_per_request,
    )?;
    let handle = state.queue.submit(params.clone()).await?;
    info!(task_id = %handle.task_id, term = %params.search_term, "manual scraping triggered");
    Ok((
        StatusCode::ACCEPTED,
        Json(ScrapeAccepted {
            message: "Scraping started successfully",
            task_id: handle.task_id,
            search_term: params.search_term,
            location: params.location,
            results: params.results_per_site,
            sites: params.sites,
        }),
    ))
}

pub async fn scrape_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<ScrapeTask>, ApiError> {
    state
        .queue
        .status(&task_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("scrape task {task_id} not found")))
}
