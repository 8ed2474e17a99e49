//! The external scraping capability: given a site, search term and location,
//! return zero or more raw job records or fail.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::model::Site;
use crate::sanitize::RawJob;

const SEARCH_PATH: &str = "api/v1/search_jobs";

/// One call to the scraping service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub site: Site,
    pub search_term: String,
    pub location: String,
    pub results_wanted: u32,
    pub job_type: Option<String>,
    pub hours_old: Option<u32>,
    /// Country name for boards that need a country selector.
    pub country_hint: Option<String>,
}

#[async_trait]
pub trait JobSource: Send + Sync {
    /// Does not filter by region; callers do that.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawJob>>;
}

/// Client for a JobSpy-compatible scraping service.
#[derive(Clone)]
pub struct HttpJobSource {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for HttpJobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpJobSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpJobSource {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = Url::parse(&settings.scraping.endpoint)
            .with_context(|| format!("invalid scraper endpoint {}", settings.scraping.endpoint))?;
        Self::with_base_url(base_url, Duration::from_secs(settings.scraping.timeout_seconds))
    }

    pub fn with_base_url(base_url: Url, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("sea-jobs/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn build_request(&self, request: &SearchRequest) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(SEARCH_PATH)
            .context("invalid scraper base URL")?;
        self.http
            .post(endpoint)
            .json(&build_search_body(request))
            .build()
            .context("failed to build scrape request")
    }
}

#[async_trait]
impl JobSource for HttpJobSource {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<RawJob>> {
        let req = self.build_request(request)?;
        debug!(url = %req.url(), site = %request.site, "requesting scrape");
        let res = self
            .http
            .execute(req)
            .await
            .context("failed to reach scraping service")?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, body, "scraping service error");
            return Err(anyhow!("scraping service error {}: {}", status, body));
        }
        let body: Value = res
            .json()
            .await
            .context("invalid scraping service response JSON")?;
        parse_jobs(body)
    }
}

/// Request payload in the JobSpy parameter names.
pub fn build_search_body(request: &SearchRequest) -> Value {
    let mut body = json!({
        "site_name": [request.site.as_str()],
        "search_term": request.search_term,
        "location": request.location,
        "results_wanted": request.results_wanted,
    });
    if let Some(job_type) = &request.job_type {
        body["job_type"] = json!(job_type);
    }
    if let Some(hours) = request.hours_old {
        body["hours_old"] = json!(hours);
    }
    if let Some(country) = &request.country_hint {
        body["country_indeed"] = json!(country);
    }
    body
}

/// Accepts either a bare array of records or `{"jobs": [...]}`.
pub fn parse_jobs(body: Value) -> Result<Vec<RawJob>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("jobs") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => return Err(anyhow!("unexpected `jobs` value: {other}")),
        },
        Value::Null => Vec::new(),
        other => return Err(anyhow!("unexpected scraping service response: {other}")),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SearchRequest {
        SearchRequest {
            site: Site::LinkedIn,
            search_term: "developer".into(),
            location: "Singapore".into(),
            results_wanted: 25,
            job_type: None,
            hours_old: Some(336),
            country_hint: Some("Singapore".into()),
        }
    }

    #[test]
    fn body_uses_jobspy_names() {
        let body = build_search_body(&request());
        assert_eq!(body["site_name"], json!(["linkedin"]));
        assert_eq!(body["results_wanted"], json!(25));
        assert_eq!(body["hours_old"], json!(336));
        assert_eq!(body["country_indeed"], json!("Singapore"));
        assert!(body.get("job_type").is_none());
    }

    #[test]
    fn request_targets_search_endpoint() {
        let source = HttpJobSource::with_base_url(
            Url::parse("http://scraper.local:8000/").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        let req = source.build_request(&request()).unwrap();
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.url().as_str(), "http://scraper.local:8000/api/v1/search_jobs");
    }

    #[test]
    fn parses_both_response_shapes() {
        let bare = parse_jobs(json!([{ "title": "a" }, 5, { "title": "b" }])).unwrap();
        assert_eq!(bare.len(), 2);

        let wrapped = parse_jobs(json!({ "count": 1, "jobs": [{ "title": "a" }] })).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0]["title"], json!("a"));

        assert!(parse_jobs(json!({ "count": 0 })).unwrap().is_empty());
        assert!(parse_jobs(json!("oops")).is_err());
    }
}
