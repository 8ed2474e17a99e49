//! Manual scrape requests: persisted as tasks, run one at a time by a
//! background worker, polled by id.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::db::{self, Pool};
use crate::ingest::{self, Ingestor};
use crate::model::{ScrapeParams, ScrapeTask};

/// Returned to the submitter; poll with [`ScrapeQueue::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskHandle {
    pub task_id: String,
}

#[derive(Clone)]
pub struct ScrapeQueue {
    pool: Pool,
    notify: Arc<Notify>,
    max_results: u32,
}

impl ScrapeQueue {
    pub fn new(pool: Pool, max_results: u32) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
            max_results,
        }
    }

    /// Validate, persist as `pending` and wake the worker.
    #[instrument(skip_all, fields(term = %params.search_term))]
    pub async fn submit(&self, params: ScrapeParams) -> Result<TaskHandle> {
        ingest::validate(&params, self.max_results)?;
        let task_id = Uuid::new_v4().to_string();
        db::insert_scrape_task(&self.pool, &task_id, &params).await?;
        self.notify.notify_one();
        info!(%task_id, location = %params.location, "scrape task queued");
        Ok(TaskHandle { task_id })
    }

    pub async fn status(&self, task_id: &str) -> Result<Option<ScrapeTask>> {
        db::get_task(&self.pool, task_id).await
    }

    /// Start the worker loop. Tasks left `running` by an earlier process are
    /// failed first.
    pub fn spawn_worker(&self, ingestor: Ingestor, poll_interval: Duration) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let notify = self.notify.clone();
        tokio::spawn(async move {
            match db::fail_interrupted_tasks(&pool).await {
                Ok(0) => {}
                Ok(n) => warn!(count = n, "marked interrupted scrape tasks as failed"),
                Err(err) => error!(?err, "failed to recover interrupted tasks"),
            }
            loop {
                match process_next_task(&pool, &ingestor).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::select! {
                            _ = notify.notified() => {}
                            _ = tokio::time::sleep(poll_interval) => {}
                        }
                    }
                    Err(err) => {
                        error!(?err, "scrape worker error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        })
    }
}

/// Claim and run the oldest pending task. Returns whether one was processed.
///
/// A task whose result cannot be recorded is still moved out of `running`
/// when the store allows it; the recording error is returned either way.
#[instrument(skip_all)]
pub async fn process_next_task(pool: &Pool, ingestor: &Ingestor) -> Result<bool> {
    let Some((id, params)) = db::claim_next_task(pool).await? else {
        return Ok(false);
    };
    info!(task_id = %id, term = %params.search_term, "scrape task started");
    match ingestor.run(&params).await {
        Ok(outcome) => {
            if let Err(err) = db::finish_task(pool, &id, outcome.inserted()).await {
                error!(task_id = %id, ?err, "could not record scrape task success");
                let message =
                    format!("scrape finished but its result could not be recorded: {err:#}");
                if let Err(fail_err) = db::fail_task(pool, &id, &message).await {
                    error!(task_id = %id, err = ?fail_err, "could not mark scrape task failed");
                }
                return Err(err.context(format!("recording result of scrape task {id}")));
            }
            info!(task_id = %id, inserted = outcome.inserted(), "scrape task succeeded");
        }
        Err(err) => {
            warn!(task_id = %id, ?err, "scrape task failed");
            if let Err(fail_err) = db::fail_task(pool, &id, &format!("{err:#}")).await {
                error!(task_id = %id, err = ?fail_err, "could not mark scrape task failed");
                return Err(fail_err.context(format!("recording failure of scrape task {id}")));
            }
        }
    }
    Ok(true)
}
