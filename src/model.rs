use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Job boards the scraping service is wired to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Indeed,
    LinkedIn,
}

impl Site {
    pub const ALL: [Site; 2] = [Site::Indeed, Site::LinkedIn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Indeed => "indeed",
            Site::LinkedIn => "linkedin",
        }
    }

    pub fn parse(s: &str) -> Option<Site> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indeed" => Some(Site::Indeed),
            "linkedin" => Some(Site::LinkedIn),
            _ => None,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeParams {
    pub search_term: String,
    pub location: String,
    pub results_per_site: u32,
    pub sites: Vec<Site>,
    pub job_type: Option<String>,
    pub hours_old: Option<u32>,
}

/// Per-site slice of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteOutcome {
    pub site: String,
    pub found: usize,
    pub kept: usize,
    pub error: Option<String>,
}

/// Counts reported by a bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    pub inserted: u64,
    pub duplicates: u64,
    pub off_region: u64,
    pub failed: u64,
}

/// What happened during one orchestrator invocation. Only logged/returned,
/// never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeRunOutcome {
    pub sites: Vec<SiteOutcome>,
    pub store: InsertReport,
    pub elapsed: Duration,
}

impl ScrapeRunOutcome {
    pub fn found(&self) -> usize {
        self.sites.iter().map(|s| s.found).sum()
    }

    pub fn kept(&self) -> usize {
        self.sites.iter().map(|s| s.kept).sum()
    }

    pub fn inserted(&self) -> u64 {
        self.store.inserted
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DailySummary {
    pub total_runs: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub elapsed: Duration,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub jobs_deleted: Option<u64>,
    pub logs_deleted: Option<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
        }
    }

    pub fn parse_state(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskState::Pending),
            "running" => Some(TaskState::Running),
            "succeeded" => Some(TaskState::Succeeded),
            "failed" => Some(TaskState::Failed),
            _ => None,
        }
    }
}

/// A queued manual scrape, as seen by pollers.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeTask {
    pub id: String,
    pub state: TaskState,
    pub params: ScrapeParams,
    pub inserted: Option<i64>,
    pub error: Option<String>,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
}
