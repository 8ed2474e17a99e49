//! Unattended runs: the daily country sweep and periodic maintenance.
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use crate::db;
use crate::ingest::Ingestor;
use crate::logging;
use crate::model::{DailySummary, MaintenanceReport, ScrapeParams, Site};
use crate::region::Country;

/// Only postings from the last two weeks.
pub const DAILY_HOURS_OLD: u32 = 14 * 24;

/// What the daily sweep scrapes for one country.
#[derive(Debug, Clone, Copy)]
pub struct CountryPlan {
    pub country: Country,
    pub search_terms: &'static [&'static str],
    pub sites: &'static [Site],
}

const COMMON_TERMS: &[&str] = &["software engineer", "developer", "data analyst"];
const SINGAPORE_TERMS: &[&str] = &[
    "software engineer",
    "developer",
    "data analyst",
    "product manager",
];
const ALL_SITES: &[Site] = &[Site::Indeed, Site::LinkedIn];

pub static DAILY_PLAN: [CountryPlan; 5] = [
    CountryPlan {
        country: Country::Indonesia,
        search_terms: COMMON_TERMS,
        sites: ALL_SITES,
    },
    CountryPlan {
        country: Country::Malaysia,
        search_terms: COMMON_TERMS,
        sites: ALL_SITES,
    },
    CountryPlan {
        country: Country::Thailand,
        search_terms: COMMON_TERMS,
        sites: ALL_SITES,
    },
    CountryPlan {
        country: Country::Vietnam,
        search_terms: COMMON_TERMS,
        sites: ALL_SITES,
    },
    CountryPlan {
        country: Country::Singapore,
        search_terms: SINGAPORE_TERMS,
        sites: ALL_SITES,
    },
];

pub struct Scheduler {
    ingestor: Ingestor,
}

impl Scheduler {
    pub fn new(ingestor: Ingestor) -> Self {
        Self { ingestor }
    }

    /// Every (country, term) pair of [`DAILY_PLAN`] in order. Failures are
    /// counted, never raised.
    #[instrument(skip_all)]
    pub async fn run_daily(&self) -> DailySummary {
        let settings = self.ingestor.settings();
        let throttle = &settings.throttle;
        info!(countries = DAILY_PLAN.len(), "daily scraping started");
        logging::log_system_resources();

        let started = Instant::now();
        let mut summary = DailySummary::default();

        for (country_idx, plan) in DAILY_PLAN.iter().enumerate() {
            info!(
                country = %plan.country,
                n = country_idx + 1,
                of = DAILY_PLAN.len(),
                "processing country"
            );
            for (term_idx, term) in plan.search_terms.iter().enumerate() {
                let params = ScrapeParams {
                    search_term: (*term).to_string(),
                    location: plan.country.scrape_location().to_string(),
                    results_per_site: settings.scraping.default_results_per_site,
                    sites: plan.sites.to_vec(),
                    job_type: None,
                    hours_old: Some(DAILY_HOURS_OLD),
                };
                let pair_started = Instant::now();
                summary.total_runs += 1;
                match self.ingestor.run(&params).await {
                    Ok(outcome) => {
                        summary.succeeded += 1;
                        info!(
                            country = %plan.country,
                            term,
                            inserted = outcome.inserted(),
                            elapsed_secs = pair_started.elapsed().as_secs_f64(),
                            "country scrape completed"
                        );
                    }
                    Err(err) => {
                        summary.failed += 1;
                        error!(
                            country = %plan.country,
                            term,
                            ?err,
                            elapsed_secs = pair_started.elapsed().as_secs_f64(),
                            "country scrape failed"
                        );
                    }
                }

                if term_idx + 1 < plan.search_terms.len() {
                    self.pause(throttle.batch_pause(), "next search term").await;
                }
            }

            if country_idx + 1 < DAILY_PLAN.len() {
                self.pause(throttle.country_pause(), "next country").await;
                logging::log_system_resources();
            }
        }

        summary.elapsed = started.elapsed();
        summary.success_rate = if summary.total_runs == 0 {
            0.0
        } else {
            f64::from(summary.succeeded) / f64::from(summary.total_runs) * 100.0
        };
        info!(
            total = summary.total_runs,
            succeeded = summary.succeeded,
            failed = summary.failed,
            success_rate = %format!("{:.1}", summary.success_rate),
            elapsed_mins = %format!("{:.1}", summary.elapsed.as_secs_f64() / 60.0),
            "daily scraping summary"
        );
        match db::count_jobs(self.ingestor.pool()).await {
            Ok(total) => info!(total, "total jobs in database"),
            Err(err) => error!(?err, "could not read database totals"),
        }
        logging::log_system_resources();
        summary
    }

    /// Delete jobs past the retention window and stale logs. Each step is
    /// attempted independently; a failed step is logged and reported as `None`.
    #[instrument(skip_all)]
    pub async fn run_weekly_maintenance(&self) -> MaintenanceReport {
        let settings = self.ingestor.settings();
        let pool = self.ingestor.pool();
        info!("weekly maintenance started");

        let jobs_deleted = match db::cleanup_older_than(pool, settings.retention.cleanup_days).await
        {
            Ok(n) => Some(n),
            Err(err) => {
                error!(?err, "job cleanup failed");
                None
            }
        };
        let logs_deleted = self.prune_logs();

        match db::statistics(pool).await {
            Ok(stats) => info!(
                total_jobs = stats.total_jobs,
                remote_percentage = stats.remote_percentage,
                "database statistics"
            ),
            Err(err) => warn!(?err, "could not read database statistics"),
        }
        logging::log_system_resources();
        info!(?jobs_deleted, ?logs_deleted, "weekly maintenance finished");
        MaintenanceReport {
            jobs_deleted,
            logs_deleted,
        }
    }

    /// Release cached memory and prune stale logs.
    #[instrument(skip_all)]
    pub async fn run_cleanup(&self) -> MaintenanceReport {
        info!("cleanup started");
        self.reclaim_memory().await;
        let logs_deleted = self.prune_logs();
        logging::log_system_resources();
        MaintenanceReport {
            jobs_deleted: None,
            logs_deleted,
        }
    }

    fn prune_logs(&self) -> Option<usize> {
        let settings = self.ingestor.settings();
        let dir = Path::new(&settings.logging.path);
        match logging::cleanup_old_logs(dir, settings.retention.log_retention_days) {
            Ok(n) => {
                info!(deleted = n, "cleaned up old log files");
                Some(n)
            }
            Err(err) => {
                error!(?err, "log cleanup failed");
                None
            }
        }
    }

    async fn pause(&self, delay: Duration, before: &str) {
        info!(secs = delay.as_secs(), before, "waiting");
        tokio::time::sleep(delay).await;
        self.reclaim_memory().await;
    }

    async fn reclaim_memory(&self) {
        if let Err(err) = db::shrink_memory(self.ingestor.pool()).await {
            warn!(?err, "memory reclamation failed");
        }
    }
}
