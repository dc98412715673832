//! Query service abstraction for medstore.
//!
//! Wraps the three Athena calls the query runner needs behind a trait so the
//! runner can be driven by a scripted fake in tests.

mod client;
mod mock;

pub use client::AthenaQueryService;
pub use mock::MockQueryService;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Lifecycle state of a query execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    /// A state this tool does not know, kept verbatim.
    Other(String),
}

impl QueryState {
    /// Parses the service's state name.
    pub fn from_service(value: &str) -> Self {
        match value {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true once no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution statistics reported with a query's status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStatistics {
    pub data_scanned_bytes: Option<i64>,
    pub engine_execution_millis: Option<i64>,
}

/// A snapshot of one query execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExecution {
    pub id: String,
    pub sql: String,
    pub database: String,
    /// `s3://<bucket>/` the service writes result objects under.
    pub output_location: String,
    pub state: QueryState,
    pub state_reason: Option<String>,
    pub statistics: QueryStatistics,
}

/// Rows of string cells. The first row is the header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Rows after the header.
    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    pub rows: Vec<Vec<String>>,
    pub next_token: Option<String>,
}

/// Trait defining the query service operations used by medstore.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submits a statement and returns the execution id.
    async fn start_query(&self, sql: &str, database: &str, output_location: &str)
        -> Result<String>;

    /// Fetches the current status of an execution.
    async fn get_execution(&self, execution_id: &str) -> Result<QueryExecution>;

    /// Fetches one page of results.
    async fn get_results_page(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
    ) -> Result<ResultPage>;
}
