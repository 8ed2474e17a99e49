//! Read side: search, statistics, filter options, health.
use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, instrument};

use super::{ApiError, AppState};
use crate::db::{self, FilterOptions, JobFilters, JobRecord, JobStats, PageRequest};
use crate::db::{SortField, SortOrder};

const DEFAULT_PER_PAGE: u32 = 20;
const NOT_SPECIFIED: &str = "Not specified";

/// A stored job plus display strings for the listing page.
#[derive(Debug, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub record: JobRecord,
    pub salary_display: String,
    pub date_posted_formatted: String,
    pub scraped_at_formatted: String,
}

impl From<JobRecord> for JobView {
    fn from(record: JobRecord) -> Self {
        let salary_display = record
            .job
            .salary_range()
            .unwrap_or_else(|| NOT_SPECIFIED.to_string());
        let date_posted_formatted = format_date_posted(record.job.date_posted.as_deref());
        let scraped_at_formatted = format_scraped_at(record.scraped_at);
        Self {
            record,
            salary_display,
            date_posted_formatted,
            scraped_at_formatted,
        }
    }
}

/// `2025-01-05` becomes `January 05, 2025`; other text passes through.
pub fn format_date_posted(raw: Option<&str>) -> String {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(|d| d.format("%B %d, %Y").to_string())
            .unwrap_or_else(|_| s.to_string()),
        None => NOT_SPECIFIED.to_string(),
    }
}

fn format_scraped_at(ts: NaiveDateTime) -> String {
    ts.format("%B %d, %Y at %I:%M %p").to_string()
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: PageRequest, total_count: i64) -> Self {
        let per_page = i64::from(page.per_page);
        let total_pages = (total_count + per_page - 1) / per_page;
        Self {
            page: page.page,
            per_page: page.per_page,
            total_count,
            total_pages,
            has_next: i64::from(page.page) < total_pages,
            has_prev: page.page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobView>,
    pub pagination: Pagination,
    pub filters: JobFilters,
}

fn parse_number<T: FromStr>(params: &HashMap<String, String>, key: &str) -> Result<Option<T>, ApiError> {
    match params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("invalid {key}: {v:?}"))),
        None => Ok(None),
    }
}

fn parse_flag(params: &HashMap<String, String>, key: &str) -> Result<Option<bool>, ApiError> {
    match params.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(ApiError::bad_request(format!("invalid {key}: {v:?}"))),
        },
    }
}

/// Turn raw query parameters into filters and a page request.
pub fn parse_search_query(
    params: &HashMap<String, String>,
    max_per_page: u32,
) -> Result<(JobFilters, PageRequest), ApiError> {
    let text = |key: &str| params.get(key).cloned();
    let filters = JobFilters {
        title: text("title"),
        company: text("company"),
        location: text("location"),
        country: text("country"),
        job_type: text("job_type"),
        site: text("site"),
        is_remote: parse_flag(params, "is_remote")?,
        min_salary: parse_number(params, "min_salary")?,
        max_salary: parse_number(params, "max_salary")?,
        days_old: parse_number(params, "days_old")?,
        sort_by: params
            .get("sort_by")
            .map(|s| SortField::parse(s))
            .unwrap_or_default(),
        sort_order: params
            .get("sort_order")
            .map(|s| SortOrder::parse(s))
            .unwrap_or_default(),
    };
    let page = PageRequest::new(
        parse_number(params, "page")?.unwrap_or(1),
        parse_number(params, "per_page")?.unwrap_or(DEFAULT_PER_PAGE),
        max_per_page,
    );
    Ok((filters, page))
}

#[instrument(skip_all)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<JobsResponse>, ApiError> {
    let (filters, page) =
        parse_search_query(&params, state.settings.scraping.max_results_per_request)?;
    let (jobs, total) = db::search_jobs(&state.pool, &filters, page).await?;
    Ok(Json(JobsResponse {
        jobs: jobs.into_iter().map(JobView::from).collect(),
        pagination: Pagination::new(page, total),
        filters,
    }))
}

pub async fn job_stats(State(state): State<AppState>) -> Result<Json<JobStats>, ApiError> {
    Ok(Json(db::statistics(&state.pool).await?))
}

pub async fn filter_options(
    State(state): State<AppState>,
) -> Result<Json<FilterOptions>, ApiError> {
    Ok(Json(db::distinct_filter_values(&state.pool).await?))
}

/// Liveness plus store reachability.
pub async fn health(State(state): State<AppState>) -> Response {
    let timestamp = Utc::now().to_rfc3339();
    match db::count_jobs(&state.pool).await {
        Ok(total_jobs) => Json(json!({
            "status": "healthy",
            "timestamp": timestamp,
            "database": { "connected": true, "total_jobs": total_jobs },
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .into_response(),
        Err(err) => {
            error!(?err, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "timestamp": timestamp,
                    "error": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}
