use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use sea_jobs::api::{self, AppState};
use sea_jobs::config;
use sea_jobs::db;
use sea_jobs::ingest::Ingestor;
use sea_jobs::logging;
use sea_jobs::model::{ScrapeParams, Site};
use sea_jobs::scheduler::Scheduler;
use sea_jobs::source::HttpJobSource;
use sea_jobs::worker::ScrapeQueue;

#[derive(Debug, Parser)]
#[command(author, version, about = "Southeast Asian job scraper")]
struct Cli {
    /// Path to YAML config file (default: ./config.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape one search term and store the SEA results
    Scrape(ScrapeArgs),
    /// Run a scheduled routine once
    Schedule {
        #[arg(value_enum)]
        routine: Routine,
    },
    /// Serve the REST API and the manual scrape worker
    Api {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        debug: bool,
    },
}

#[derive(Debug, Args)]
struct ScrapeArgs {
    #[arg(long)]
    search_term: String,
    /// Location; must name a supported country
    #[arg(long)]
    location: String,
    /// Results per site (default: scraping.default_results_per_site)
    #[arg(long)]
    results: Option<u32>,
    #[arg(long, num_args = 1.., value_parser = parse_site, default_values = ["indeed", "linkedin"])]
    sites: Vec<Site>,
    #[arg(long)]
    job_type: Option<String>,
    /// Maximum posting age in hours
    #[arg(long)]
    hours_old: Option<u32>,
}

impl ScrapeArgs {
    fn into_params(self, default_results: u32) -> ScrapeParams {
        ScrapeParams {
            search_term: self.search_term,
            location: self.location,
            results_per_site: self.results.unwrap_or(default_results),
            sites: self.sites,
            job_type: self.job_type,
            hours_old: self.hours_old,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Routine {
    Daily,
    Weekly,
    Cleanup,
}

fn parse_site(s: &str) -> Result<Site, String> {
    Site::parse(s).ok_or_else(|| format!("unknown site {s:?} (expected indeed or linkedin)"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(?err, "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = config::load(cli.config.as_deref())?;
    let mut verbose = cli.verbose;
    let component = match &cli.command {
        Command::Scrape(_) => "scraper",
        Command::Schedule { .. } => "scheduler",
        Command::Api { host, port, debug } => {
            if let Some(host) = host {
                settings.api.host = host.clone();
            }
            if let Some(port) = port {
                settings.api.port = *port;
            }
            if *debug {
                settings.api.debug = true;
            }
            verbose |= settings.api.debug;
            config::validate(&settings)?;
            "api"
        }
    };
    settings.ensure_dirs().context("failed to create data/log directories")?;
    logging::init(&settings, component, verbose)?;

    let settings = Arc::new(settings);
    let pool = db::init_pool(&settings.storage.db_path).await?;
    db::ensure_schema(&pool).await?;
    let source = Arc::new(HttpJobSource::from_settings(&settings)?);
    let ingestor = Ingestor::new(pool.clone(), source, settings.clone());

    match cli.command {
        Command::Scrape(args) => {
            let params = args.into_params(settings.scraping.default_results_per_site);
            let outcome = ingestor.run(&params).await?;
            println!(
                "Scraping completed successfully. Inserted {} jobs.",
                outcome.inserted()
            );
        }
        Command::Schedule { routine } => {
            let scheduler = Scheduler::new(ingestor);
            match routine {
                Routine::Daily => {
                    let summary = scheduler.run_daily().await;
                    println!(
                        "Daily scraping finished: {}/{} succeeded ({:.1}%)",
                        summary.succeeded, summary.total_runs, summary.success_rate
                    );
                }
                Routine::Weekly => {
                    scheduler.run_weekly_maintenance().await;
                }
                Routine::Cleanup => {
                    scheduler.run_cleanup().await;
                }
            }
        }
        Command::Api { .. } => {
            let queue = ScrapeQueue::new(pool.clone(), settings.scraping.max_results_per_request);
            let worker = queue.spawn_worker(
                ingestor,
                Duration::from_millis(settings.worker.poll_interval_ms),
            );
            info!(db = %settings.storage.db_path, logs = %settings.logging.path, "starting api");
            let state = AppState {
                pool,
                settings: settings.clone(),
                queue,
            };
            let served = api::serve(state, &settings.api.host, settings.api.port).await;
            worker.abort();
            served?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrape_args(argv: &[&str]) -> ScrapeArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Scrape(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn scrape_results_fall_back_to_setting() {
        let args = scrape_args(&[
            "sea-jobs",
            "scrape",
            "--search-term",
            "developer",
            "--location",
            "Singapore",
        ]);
        let params = args.into_params(40);
        assert_eq!(params.results_per_site, 40);
        assert_eq!(params.sites, vec![Site::Indeed, Site::LinkedIn]);
        assert_eq!(params.hours_old, None);
    }

    #[test]
    fn scrape_results_flag_wins() {
        let args = scrape_args(&[
            "sea-jobs",
            "scrape",
            "--search-term",
            "developer",
            "--location",
            "Hanoi, Vietnam",
            "--results",
            "10",
            "--sites",
            "linkedin",
        ]);
        let params = args.into_params(40);
        assert_eq!(params.results_per_site, 10);
        assert_eq!(params.sites, vec![Site::LinkedIn]);
    }

    #[test]
    fn unknown_site_is_rejected() {
        assert!(Cli::try_parse_from([
            "sea-jobs",
            "scrape",
            "--search-term",
            "developer",
            "--location",
            "Singapore",
            "--sites",
            "monster",
        ])
        .is_err());
    }
}
