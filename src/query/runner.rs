//! Query submission, status polling and result retrieval.
//!
//! A [`QueryRunner`] owns no clients; it borrows the query service and the
//! object store for the duration of one command.

use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::naming::{is_select, result_file_name};
use crate::athena::{QueryExecution, QueryService, QueryState, ResultSet};
use crate::error::{MedstoreError, Result};
use crate::storage::{CopySpec, ObjectStore};

/// Delay between two status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long a query may stay non-terminal before the runner gives up.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(300);

/// Polling cadence and limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// `None` polls until a terminal state or cancellation.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: Some(DEFAULT_QUERY_TIMEOUT),
        }
    }
}

impl PollSettings {
    /// Builds settings from a timeout in seconds, where zero means no limit.
    pub fn from_timeout_secs(secs: u64) -> Self {
        Self {
            timeout: (secs > 0).then(|| Duration::from_secs(secs)),
            ..Self::default()
        }
    }
}

/// Result of running one statement to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub execution: QueryExecution,
    /// Result rows, present for successful `SELECT` statements only.
    pub rows: Option<ResultSet>,
    /// Key of the stored result copy in the output bucket.
    pub stored_as: Option<String>,
}

/// Runs statements against one database, writing results to one bucket.
pub struct QueryRunner<'a> {
    queries: &'a dyn QueryService,
    store: &'a dyn ObjectStore,
    database: String,
    output_bucket: String,
    poll: PollSettings,
    result_date: Option<NaiveDate>,
}

impl<'a> QueryRunner<'a> {
    /// Creates a runner with the default poll settings.
    pub fn new(
        queries: &'a dyn QueryService,
        store: &'a dyn ObjectStore,
        database: impl Into<String>,
        output_bucket: impl Into<String>,
    ) -> Self {
        Self {
            queries,
            store,
            database: database.into(),
            output_bucket: output_bucket.into(),
            poll: PollSettings::default(),
            result_date: None,
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Fixes the date used in stored result names instead of today's.
    pub fn with_result_date(mut self, date: NaiveDate) -> Self {
        self.result_date = Some(date);
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// The `s3://` location query results are written under.
    pub fn output_location(&self) -> String {
        format!("s3://{}/", self.output_bucket)
    }

    /// Submits a statement and returns its execution id.
    pub async fn submit(&self, sql: &str) -> Result<String> {
        let id = self
            .queries
            .start_query(sql, &self.database, &self.output_location())
            .await?;
        info!("Executing Athena query: {}", id);
        Ok(id)
    }

    /// Polls an execution until it reaches a terminal state.
    ///
    /// Fails with [`MedstoreError::Timeout`] once the configured timeout has
    /// elapsed and with [`MedstoreError::Cancelled`] when `cancel` fires.
    pub async fn wait_for_completion(
        &self,
        execution_id: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryExecution> {
        let deadline = self.poll.timeout.map(|t| Instant::now() + t);

        loop {
            if cancel.is_cancelled() {
                return Err(cancelled(execution_id));
            }

            let execution = self.queries.get_execution(execution_id).await?;
            if execution.state.is_terminal() {
                info!(
                    "Athena query '{}' ended with state: {}",
                    execution_id, execution.state
                );
                if let Some(reason) = &execution.state_reason {
                    info!("Reason: {}", reason);
                }
                return Ok(execution);
            }

            debug!(
                "Waiting for Athena query '{}' to complete ({})",
                execution_id, execution.state
            );

            let limit = async {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    return Err(cancelled(execution_id));
                }
                _ = limit => {
                    warn!("Athena query '{}' still {} after timeout", execution_id, execution.state);
                    return Err(MedstoreError::Timeout(format!(
                        "Athena query '{execution_id}' did not finish within {}s (last state {})",
                        self.poll.timeout.map(|t| t.as_secs()).unwrap_or_default(),
                        execution.state
                    )));
                }
                _ = sleep(self.poll.interval) => {}
            }
        }
    }

    /// Submits a statement and waits for it to succeed.
    ///
    /// A `FAILED` or `CANCELLED` execution becomes [`MedstoreError::QueryFailed`]
    /// carrying the service's reason.
    pub async fn execute(&self, sql: &str, cancel: &CancellationToken) -> Result<QueryExecution> {
        let id = self.submit(sql).await?;
        let execution = self.wait_for_completion(&id, cancel).await?;

        if execution.state != QueryState::Succeeded {
            warn!(
                "Athena query '{}' failed: {}",
                id,
                execution.state_reason.as_deref().unwrap_or("no reason given")
            );
            return Err(MedstoreError::QueryFailed {
                execution_id: id,
                state: execution.state.to_string(),
                reason: execution.state_reason,
            });
        }
        Ok(execution)
    }

    /// Runs a statement to completion.
    ///
    /// A successful `SELECT` has its rows fetched and its result object
    /// copied to a dated name; any other statement fetches nothing.
    pub async fn run(&self, sql: &str, cancel: &CancellationToken) -> Result<QueryOutcome> {
        let execution = self.execute(sql, cancel).await?;

        if !is_select(sql) {
            debug!("Non-SELECT statement, no results to store");
            return Ok(QueryOutcome {
                execution,
                rows: None,
                stored_as: None,
            });
        }

        let rows = self.fetch_results(&execution.id).await?;
        let stored_as = self.store_results(&execution.id, sql).await?;

        Ok(QueryOutcome {
            execution,
            rows: Some(rows),
            stored_as: Some(stored_as),
        })
    }

    /// Fetches every result page of a finished execution.
    pub async fn fetch_results(&self, execution_id: &str) -> Result<ResultSet> {
        let mut rows = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .queries
                .get_results_page(execution_id, token.as_deref())
                .await?;
            rows.extend(page.rows);

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!("Fetched {} result rows for {}", rows.len(), execution_id);
        Ok(ResultSet { rows })
    }

    /// Copies `<id>.csv` to its derived name and returns the new key.
    async fn store_results(&self, execution_id: &str, sql: &str) -> Result<String> {
        let date = self
            .result_date
            .unwrap_or_else(|| Local::now().date_naive());
        let key = format!("{}.csv", result_file_name(sql, date));

        let copy = CopySpec::new(format!("{execution_id}.csv"), key.as_str());
        self.store.copy_object(&self.output_bucket, &copy).await?;

        info!("Results stored with filename: {}", key);
        Ok(key)
    }
}

fn cancelled(execution_id: &str) -> MedstoreError {
    MedstoreError::Cancelled(format!(
        "stopped waiting for Athena query '{execution_id}'"
    ))
}
