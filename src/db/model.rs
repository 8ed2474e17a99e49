//! Job rows as written and read by the store.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! lives in `sanitize` and higher layers.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A sanitized job ready for insertion: exactly the persisted column set minus
/// the surrogate id and `scraped_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NewJob {
    pub site: String,
    pub job_url: String,
    pub title: String,
    pub job_url_direct: Option<String>,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub date_posted: Option<String>,
    pub interval: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub currency: Option<String>,
    pub is_remote: bool,
    pub job_level: Option<String>,
    pub job_function: Option<String>,
    pub company_industry: Option<String>,
    pub listing_type: Option<String>,
    pub emails: Option<String>,
    pub description: Option<String>,
    pub company_url: Option<String>,
    pub company_url_direct: Option<String>,
    pub company_addresses: Option<String>,
    pub company_num_employees: Option<String>,
    pub company_revenue: Option<String>,
    pub company_description: Option<String>,
    pub logo_photo_url: Option<String>,
    pub banner_photo_url: Option<String>,
    pub ceo_name: Option<String>,
    pub ceo_photo_url: Option<String>,
    pub compensation_interval: Option<String>,
    pub salary_source: Option<String>,
    pub company_rating: Option<f64>,
    pub skills: Option<String>,
    pub experience_range: Option<String>,
}

/// A stored job.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub job: NewJob,
    pub scraped_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryCount {
    pub country: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteCount {
    pub site: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalaryStats {
    pub avg_min_salary: f64,
    pub avg_max_salary: f64,
    pub min_salary: f64,
    pub max_salary: f64,
    pub jobs_with_salary: i64,
    pub percentage_with_salary: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    pub total_jobs: i64,
    pub jobs_by_country: Vec<CountryCount>,
    pub jobs_by_site: Vec<SiteCount>,
    pub remote_percentage: f64,
    pub salary_stats: SalaryStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub companies: Vec<String>,
    pub locations: Vec<String>,
    pub job_types: Vec<String>,
    pub sites: Vec<String>,
}
