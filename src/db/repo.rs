use super::filter::{push_where, JobFilters};
use super::model::{
    CountryCount, FilterOptions, JobRecord, JobStats, NewJob, SalaryStats, SiteCount,
};
use crate::model::{InsertReport, ScrapeParams, ScrapeTask, TaskState};
use crate::region;
use crate::sanitize::{self, RawJob};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};

pub type Pool = SqlitePool;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MAX_COMPANY_OPTIONS: i64 = 100;
const MAX_LOCATION_OPTIONS: i64 = 50;

/// Timestamp text as stored in `scraped_at` and the task table (UTC).
pub fn to_sql_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Open (creating if missing) the SQLite file at `db_path`.
pub async fn init_pool(db_path: &str) -> Result<Pool> {
    let path = expand_home(db_path);
    // Ensure parent directory exists if any
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    Ok(pool)
}

/// Expand a leading `~/` to `$HOME`.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home.trim_end_matches('/')).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Create the job and task tables plus their indexes if absent.
pub async fn ensure_schema(pool: &Pool) -> Result<()> {
    info!("creating/verifying database schema");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply schema")?;
    Ok(())
}

/// Ask SQLite to release as much cached memory as it can.
pub async fn shrink_memory(pool: &Pool) -> Result<()> {
    sqlx::query("PRAGMA shrink_memory").execute(pool).await?;
    Ok(())
}

/// Bulk insert raw records in `batch_size` chunks, each chunk committed on its
/// own. Off-region records are skipped, duplicates on `(job_url, site)` are
/// ignored, and a failing record is logged and skipped.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn insert_jobs(pool: &Pool, records: &[RawJob], batch_size: usize) -> Result<InsertReport> {
    let mut report = InsertReport::default();
    if records.is_empty() {
        warn!("no jobs to insert");
        return Ok(report);
    }
    info!(count = records.len(), "inserting jobs");

    let scraped_at = to_sql_ts(Utc::now());
    let chunks = records.chunks(batch_size.max(1));
    let total_chunks = chunks.len();
    for (idx, chunk) in chunks.enumerate() {
        debug!(chunk = idx + 1, total_chunks, "processing insert chunk");
        let mut tx = pool.begin().await.context("failed to begin insert chunk")?;
        for raw in chunk {
            let location = sanitize::raw_location(raw);
            if !region::is_sea_location_opt(location.as_deref()) {
                debug!(location = ?location, "skipping job outside SEA");
                report.off_region += 1;
                continue;
            }
            let job = sanitize::sanitize(raw);
            match insert_job(&mut tx, &job, &scraped_at).await {
                Ok(true) => report.inserted += 1,
                Ok(false) => {
                    debug!(title = %job.title, url = %job.job_url, "duplicate skipped");
                    report.duplicates += 1;
                }
                Err(err) => {
                    error!(?err, title = %job.title, "failed to insert job");
                    report.failed += 1;
                }
            }
        }
        tx.commit().await.context("failed to commit insert chunk")?;
    }

    info!(
        inserted = report.inserted,
        duplicates = report.duplicates,
        off_region = report.off_region,
        failed = report.failed,
        "job insertion complete"
    );
    Ok(report)
}

async fn insert_job(tx: &mut Transaction<'_, Sqlite>, job: &NewJob, scraped_at: &str) -> Result<bool> {
    let res = sqlx::query(
        "INSERT INTO jobs (
            site, job_url, job_url_direct, title, company_name, location,
            job_type, date_posted, interval, min_amount, max_amount, currency,
            is_remote, job_level, job_function, company_industry, listing_type,
            emails, description, company_url, company_url_direct, company_addresses,
            company_num_employees, company_revenue, company_description,
            logo_photo_url, banner_photo_url, ceo_name, ceo_photo_url,
            compensation_interval, salary_source, company_rating, skills,
            experience_range, scraped_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(job_url, site) DO NOTHING",
    )
    .bind(&job.site)
    .bind(&job.job_url)
    .bind(&job.job_url_direct)
    .bind(&job.title)
    .bind(&job.company_name)
    .bind(&job.location)
    .bind(&job.job_type)
    .bind(&job.date_posted)
    .bind(&job.interval)
    .bind(job.min_amount)
    .bind(job.max_amount)
    .bind(&job.currency)
    .bind(job.is_remote)
    .bind(&job.job_level)
    .bind(&job.job_function)
    .bind(&job.company_industry)
    .bind(&job.listing_type)
    .bind(&job.emails)
    .bind(&job.description)
    .bind(&job.company_url)
    .bind(&job.company_url_direct)
    .bind(&job.company_addresses)
    .bind(&job.company_num_employees)
    .bind(&job.company_revenue)
    .bind(&job.company_description)
    .bind(&job.logo_photo_url)
    .bind(&job.banner_photo_url)
    .bind(&job.ceo_name)
    .bind(&job.ceo_photo_url)
    .bind(&job.compensation_interval)
    .bind(&job.salary_source)
    .bind(job.company_rating)
    .bind(&job.skills)
    .bind(&job.experience_range)
    .bind(scraped_at)
    .execute(&mut **tx)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// 1-indexed page request with `per_page` clamped to `1..=max_per_page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32, max_per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, max_per_page.max(1)),
        }
    }

    fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

/// Filtered, sorted, paginated search. The count ignores pagination.
#[instrument(skip_all)]
pub async fn search_jobs(
    pool: &Pool,
    filters: &JobFilters,
    page: PageRequest,
) -> Result<(Vec<JobRecord>, i64)> {
    let predicates = filters.predicates(Utc::now());

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM jobs");
    push_where(&mut count, &predicates);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM jobs");
    push_where(&mut query, &predicates);
    query.push(filters.order_clause());
    query
        .push(" LIMIT ")
        .push_bind(i64::from(page.per_page))
        .push(" OFFSET ")
        .push_bind(page.offset());
    let jobs = query.build_query_as::<JobRecord>().fetch_all(pool).await?;
    Ok((jobs, total))
}

pub async fn count_jobs(pool: &Pool) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}

/// Aggregate counts and salary figures. Country buckets use the same alias
/// classifier as ingestion.
#[instrument(skip_all)]
pub async fn statistics(pool: &Pool) -> Result<JobStats> {
    let total_jobs = count_jobs(pool).await?;

    let by_location: Vec<(Option<String>, i64)> =
        sqlx::query_as("SELECT location, COUNT(*) FROM jobs GROUP BY location")
            .fetch_all(pool)
            .await?;
    let mut buckets: HashMap<&'static str, i64> = HashMap::new();
    for (location, count) in &by_location {
        *buckets.entry(region::bucket(location.as_deref())).or_default() += count;
    }
    let mut jobs_by_country: Vec<CountryCount> = buckets
        .into_iter()
        .map(|(country, count)| CountryCount {
            country: country.to_string(),
            count,
        })
        .collect();
    jobs_by_country.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.country.cmp(&b.country)));

    let jobs_by_site = sqlx::query_as::<_, (String, i64)>(
        "SELECT site, COUNT(*) AS n FROM jobs GROUP BY site ORDER BY n DESC, site ASC",
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(site, count)| SiteCount { site, count })
    .collect();

    let remote: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE is_remote = 1")
        .fetch_one(pool)
        .await?;

    let (avg_min, avg_max, min_salary, max_salary, with_salary): (
        Option<f64>,
        Option<f64>,
        Option<f64>,
        Option<f64>,
        i64,
    ) = sqlx::query_as(
        "SELECT AVG(min_amount), AVG(max_amount), MIN(min_amount), MAX(max_amount), COUNT(*)
         FROM jobs WHERE min_amount IS NOT NULL OR max_amount IS NOT NULL",
    )
    .fetch_one(pool)
    .await?;

    let salary_stats = if with_salary > 0 {
        SalaryStats {
            avg_min_salary: round_to(avg_min.unwrap_or(0.0), 2),
            avg_max_salary: round_to(avg_max.unwrap_or(0.0), 2),
            min_salary: min_salary.unwrap_or(0.0),
            max_salary: max_salary.unwrap_or(0.0),
            jobs_with_salary: with_salary,
            percentage_with_salary: percentage(with_salary, total_jobs),
        }
    } else {
        SalaryStats::default()
    };

    Ok(JobStats {
        total_jobs,
        jobs_by_country,
        jobs_by_site,
        remote_percentage: percentage(remote, total_jobs),
        salary_stats,
    })
}

/// Delete jobs scraped more than `days` days ago. Irrecoverable.
#[instrument(skip_all)]
pub async fn cleanup_older_than(pool: &Pool, days: u32) -> Result<u64> {
    let cutoff = Utc::now()
        .checked_sub_signed(Duration::days(i64::from(days)))
        .map(to_sql_ts)
        .ok_or_else(|| anyhow!("retention window of {days} days is out of range"))?;
    let res = sqlx::query("DELETE FROM jobs WHERE scraped_at < ?")
        .bind(&cutoff)
        .execute(pool)
        .await?;
    let deleted = res.rows_affected();
    info!(deleted, days, "cleaned up old jobs");
    Ok(deleted)
}

/// Sorted distinct non-null values for the search filter dropdowns.
#[instrument(skip_all)]
pub async fn distinct_filter_values(pool: &Pool) -> Result<FilterOptions> {
    let companies: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT company_name FROM jobs WHERE company_name IS NOT NULL ORDER BY company_name LIMIT ?",
    )
    .bind(MAX_COMPANY_OPTIONS)
    .fetch_all(pool)
    .await?;
    let locations: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT location FROM jobs WHERE location IS NOT NULL ORDER BY location LIMIT ?",
    )
    .bind(MAX_LOCATION_OPTIONS)
    .fetch_all(pool)
    .await?;
    let job_types: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT job_type FROM jobs WHERE job_type IS NOT NULL ORDER BY job_type",
    )
    .fetch_all(pool)
    .await?;
    let sites: Vec<String> = sqlx::query_scalar("SELECT DISTINCT site FROM jobs ORDER BY site")
        .fetch_all(pool)
        .await?;
    Ok(FilterOptions {
        companies,
        locations,
        job_types,
        sites,
    })
}

#[instrument(skip_all)]
pub async fn insert_scrape_task(pool: &Pool, id: &str, params: &ScrapeParams) -> Result<()> {
    let payload = serde_json::to_string(params)?;
    sqlx::query("INSERT INTO scrape_tasks (id, status, params, created_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(TaskState::Pending.as_str())
        .bind(payload)
        .bind(to_sql_ts(Utc::now()))
        .execute(pool)
        .await?;
    Ok(())
}

/// Move the oldest pending task to `running` and return it.
#[instrument(skip_all)]
pub async fn claim_next_task(pool: &Pool) -> Result<Option<(String, ScrapeParams)>> {
    let row: Option<(String, String)> = sqlx::query_as(
        "UPDATE scrape_tasks SET status = 'running', started_at = ?
         WHERE id = (SELECT id FROM scrape_tasks WHERE status = 'pending' ORDER BY created_at ASC, rowid ASC LIMIT 1)
         RETURNING id, params",
    )
    .bind(to_sql_ts(Utc::now()))
    .fetch_optional(pool)
    .await?;
    let Some((id, payload)) = row else {
        return Ok(None);
    };
    let params = serde_json::from_str(&payload)
        .with_context(|| format!("corrupt params for scrape task {id}"))?;
    Ok(Some((id, params)))
}

#[instrument(skip_all)]
pub async fn finish_task(pool: &Pool, id: &str, inserted: u64) -> Result<()> {
    sqlx::query(
        "UPDATE scrape_tasks SET status = 'succeeded', inserted = ?, finished_at = ? WHERE id = ?",
    )
    .bind(inserted as i64)
    .bind(to_sql_ts(Utc::now()))
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn fail_task(pool: &Pool, id: &str, error: &str) -> Result<()> {
    sqlx::query(
        "UPDATE scrape_tasks SET status = 'failed', error = ?, finished_at = ? WHERE id = ?",
    )
    .bind(error)
    .bind(to_sql_ts(Utc::now()))
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Tasks still marked `running` belong to a previous process; fail them.
pub async fn fail_interrupted_tasks(pool: &Pool) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE scrape_tasks SET status = 'failed', error = 'interrupted', finished_at = ? WHERE status = 'running'",
    )
    .bind(to_sql_ts(Utc::now()))
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

type TaskRow = (
    String,
    String,
    String,
    Option<i64>,
    Option<String>,
    NaiveDateTime,
    Option<NaiveDateTime>,
    Option<NaiveDateTime>,
);

pub async fn get_task(pool: &Pool, id: &str) -> Result<Option<ScrapeTask>> {
    let row: Option<TaskRow> = sqlx::query_as(
        "SELECT id, status, params, inserted, error, created_at, started_at, finished_at
         FROM scrape_tasks WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    let Some((id, status, params, inserted, error, created_at, started_at, finished_at)) = row
    else {
        return Ok(None);
    };
    let state = TaskState::parse_state(&status)
        .ok_or_else(|| anyhow!("unknown task status {status:?}"))?;
    Ok(Some(ScrapeTask {
        id,
        state,
        params: serde_json::from_str(&params)?,
        inserted,
        error,
        created_at,
        started_at,
        finished_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Site;

    async fn setup_pool() -> Pool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();
        pool
    }

    fn params() -> ScrapeParams {
        ScrapeParams {
            search_term: "developer".into(),
            location: "Singapore".into(),
            results_per_site: 10,
            sites: vec![Site::Indeed],
            job_type: None,
            hours_old: None,
        }
    }

    #[test]
    fn page_request_clamps() {
        assert_eq!(PageRequest::new(0, 0, 200), PageRequest { page: 1, per_page: 1 });
        assert_eq!(PageRequest::new(3, 500, 200), PageRequest { page: 3, per_page: 200 });
        assert_eq!(PageRequest::new(3, 20, 200).offset(), 40);
    }

    #[test]
    fn home_expansion() {
        assert_eq!(expand_home("./data/jobs.db"), PathBuf::from("./data/jobs.db"));
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(
                expand_home("~/data/jobs.db"),
                PathBuf::from(home.trim_end_matches('/')).join("data/jobs.db")
            );
        }
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let pool = setup_pool().await;
        ensure_schema(&pool).await.unwrap();
        assert_eq!(count_jobs(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn task_lifecycle() {
        let pool = setup_pool().await;
        insert_scrape_task(&pool, "t-1", &params()).await.unwrap();
        insert_scrape_task(&pool, "t-2", &params()).await.unwrap();

        let task = get_task(&pool, "t-1").await.unwrap().unwrap();
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.params, params());

        let (id, claimed) = claim_next_task(&pool).await.unwrap().unwrap();
        assert_eq!(id, "t-1");
        assert_eq!(claimed, params());
        finish_task(&pool, &id, 3).await.unwrap();

        let (id, _) = claim_next_task(&pool).await.unwrap().unwrap();
        assert_eq!(id, "t-2");
        assert!(claim_next_task(&pool).await.unwrap().is_none());
        assert_eq!(fail_interrupted_tasks(&pool).await.unwrap(), 1);

        let done = get_task(&pool, "t-1").await.unwrap().unwrap();
        assert_eq!(done.state, TaskState::Succeeded);
        assert_eq!(done.inserted, Some(3));
        assert!(done.finished_at.is_some());

        let interrupted = get_task(&pool, "t-2").await.unwrap().unwrap();
        assert_eq!(interrupted.state, TaskState::Failed);
        assert_eq!(interrupted.error.as_deref(), Some("interrupted"));

        assert!(get_task(&pool, "missing").await.unwrap().is_none());
    }
}
