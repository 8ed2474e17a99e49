use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::db::{self, Pool};
use crate::logging;
use crate::model::{ScrapeParams, ScrapeRunOutcome, SiteOutcome};
use crate::region;
use crate::sanitize::{self, RawJob};
use crate::source::{JobSource, SearchRequest};

const SAMPLE_SIZE: usize = 3;

/// Hard ceiling on results per site, whatever the configured cap says.
pub const MAX_RESULTS_PER_SITE: u32 = 200;

/// Bad scrape parameters. Raised before any call to the scraping service.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("search term must not be empty")]
    EmptySearchTerm,
    #[error("location must not be empty")]
    EmptyLocation,
    #[error("results per site must be between 1 and {max}, got {value}")]
    ResultsOutOfRange { value: u32, max: u32 },
    #[error("at least one site is required")]
    NoSites,
    #[error("location {0:?} is not in a supported country")]
    UnsupportedLocation(String),
}

/// Checks a parameter set against the configured result cap, itself bounded
/// by [`MAX_RESULTS_PER_SITE`].
pub fn validate(params: &ScrapeParams, max_results: u32) -> Result<(), ValidationError> {
    let max_results = max_results.min(MAX_RESULTS_PER_SITE);
    if params.search_term.trim().is_empty() {
        return Err(ValidationError::EmptySearchTerm);
    }
    if params.location.trim().is_empty() {
        return Err(ValidationError::EmptyLocation);
    }
    if params.results_per_site == 0 || params.results_per_site > max_results {
        return Err(ValidationError::ResultsOutOfRange {
            value: params.results_per_site,
            max: max_results,
        });
    }
    if params.sites.is_empty() {
        return Err(ValidationError::NoSites);
    }
    if !region::names_recognized_country(&params.location) {
        return Err(ValidationError::UnsupportedLocation(params.location.clone()));
    }
    Ok(())
}

/// Runs one scrape: every requested site in turn, SEA filter, bulk insert.
#[derive(Clone)]
pub struct Ingestor {
    pool: Pool,
    source: Arc<dyn JobSource>,
    settings: Arc<Settings>,
}

impl Ingestor {
    pub fn new(pool: Pool, source: Arc<dyn JobSource>, settings: Arc<Settings>) -> Self {
        Self {
            pool,
            source,
            settings,
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Scrape and store. Per-site failures count as empty results; validation
    /// and store errors are returned.
    #[instrument(skip_all, fields(term = %params.search_term, location = %params.location))]
    pub async fn run(&self, params: &ScrapeParams) -> Result<ScrapeRunOutcome> {
        validate(params, self.settings.scraping.max_results_per_request)?;
        let started = Instant::now();
        info!(
            sites = ?params.sites,
            results_per_site = params.results_per_site,
            "starting scrape run"
        );
        logging::log_system_resources();

        let country_hint = region::country_of(&params.location).map(|c| c.as_str().to_string());
        let mut outcome = ScrapeRunOutcome::default();
        let mut survivors: Vec<RawJob> = Vec::new();

        for (idx, site) in params.sites.iter().enumerate() {
            let request = SearchRequest {
                site: *site,
                search_term: params.search_term.clone(),
                location: params.location.clone(),
                results_wanted: params.results_per_site,
                job_type: params.job_type.clone(),
                hours_old: params.hours_old,
                country_hint: country_hint.clone(),
            };
            let mut site_outcome = SiteOutcome {
                site: site.to_string(),
                ..Default::default()
            };
            match self.source.search(&request).await {
                Ok(records) => {
                    site_outcome.found = records.len();
                    let before = survivors.len();
                    survivors.extend(records.into_iter().filter(|raw| {
                        region::is_sea_location_opt(sanitize::raw_location(raw).as_deref())
                    }));
                    site_outcome.kept = survivors.len() - before;
                    info!(
                        site = %site,
                        found = site_outcome.found,
                        kept = site_outcome.kept,
                        "site scraped"
                    );
                }
                Err(err) => {
                    warn!(site = %site, ?err, "scrape failed; treating as no results");
                    site_outcome.error = Some(format!("{err:#}"));
                }
            }
            outcome.sites.push(site_outcome);

            if idx + 1 < params.sites.len() {
                tokio::time::sleep(self.settings.throttle.site_pause()).await;
            }
        }

        if survivors.is_empty() {
            warn!("no SEA jobs found");
        } else {
            for raw in survivors.iter().take(SAMPLE_SIZE) {
                let job = sanitize::sanitize(raw);
                info!(
                    title = %job.title,
                    company = job.company_name.as_deref().unwrap_or("-"),
                    location = job.location.as_deref().unwrap_or("-"),
                    "sample job"
                );
            }
            outcome.store =
                db::insert_jobs(&self.pool, &survivors, self.settings.throttle.batch_size).await?;
        }

        outcome.elapsed = started.elapsed();
        info!(
            found = outcome.found(),
            kept = outcome.kept(),
            inserted = outcome.inserted(),
            duplicates = outcome.store.duplicates,
            elapsed_secs = outcome.elapsed.as_secs_f64(),
            "scrape run complete"
        );
        logging::log_system_resources();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Site;

    fn params() -> ScrapeParams {
        ScrapeParams {
            search_term: "developer".into(),
            location: "Kuala Lumpur, Malaysia".into(),
            results_per_site: 25,
            sites: vec![Site::Indeed, Site::LinkedIn],
            job_type: None,
            hours_old: None,
        }
    }

    #[test]
    fn accepts_well_formed_params() {
        assert_eq!(validate(&params(), 200), Ok(()));
    }

    #[test]
    fn rejects_bad_params() {
        let mut p = params();
        p.search_term = "  ".into();
        assert_eq!(validate(&p, 200), Err(ValidationError::EmptySearchTerm));

        let mut p = params();
        p.location = String::new();
        assert_eq!(validate(&p, 200), Err(ValidationError::EmptyLocation));

        let mut p = params();
        p.results_per_site = 0;
        assert!(matches!(
            validate(&p, 200),
            Err(ValidationError::ResultsOutOfRange { value: 0, max: 200 })
        ));
        p.results_per_site = 201;
        assert!(validate(&p, 200).is_err());
        p.results_per_site = 200;
        assert!(validate(&p, 200).is_ok());

        let mut p = params();
        p.sites.clear();
        assert_eq!(validate(&p, 200), Err(ValidationError::NoSites));
    }

    #[test]
    fn configured_cap_cannot_lift_ceiling() {
        let mut p = params();
        p.results_per_site = 300;
        assert_eq!(
            validate(&p, 500),
            Err(ValidationError::ResultsOutOfRange { value: 300, max: 200 })
        );
        p.results_per_site = 200;
        assert_eq!(validate(&p, 500), Ok(()));
        p.results_per_site = 60;
        assert!(validate(&p, 50).is_err());
    }

    #[test]
    fn city_alone_is_not_enough() {
        let mut p = params();
        p.location = "Kuala Lumpur".into();
        assert_eq!(
            validate(&p, 200),
            Err(ValidationError::UnsupportedLocation("Kuala Lumpur".into()))
        );
        p.location = "singapore".into();
        assert!(validate(&p, 200).is_ok());
    }
}
