//! Scripted query service for testing.
//!
//! Each submitted query walks through a scripted sequence of states, one
//! state per status poll. The last state repeats once the script runs out.

use super::{QueryExecution, QueryService, QueryState, QueryStatistics, ResultPage};
use crate::error::{MedstoreError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct Execution {
    snapshot: QueryExecution,
    remaining: VecDeque<QueryState>,
}

#[derive(Debug, Default)]
struct State {
    executions: HashMap<String, Execution>,
    submitted: Vec<String>,
    status_polls: usize,
    result_calls: usize,
}

/// In-memory [`QueryService`] with scripted state transitions.
#[derive(Debug)]
pub struct MockQueryService {
    script: Vec<QueryState>,
    reason: Option<String>,
    bytes_scanned: i64,
    pages: Vec<Vec<Vec<String>>>,
    state: Mutex<State>,
}

impl Default for MockQueryService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockQueryService {
    /// Creates a service whose queries succeed on the first poll with no rows.
    pub fn new() -> Self {
        Self {
            script: vec![QueryState::Succeeded],
            reason: None,
            bytes_scanned: 0,
            pages: vec![Vec::new()],
            state: Mutex::new(State::default()),
        }
    }

    /// Sets the states reported by successive polls of each execution.
    pub fn with_states(mut self, states: Vec<QueryState>) -> Self {
        self.script = states;
        self
    }

    /// Sets the state change reason reported by every execution.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_bytes_scanned(mut self, bytes: i64) -> Self {
        self.bytes_scanned = bytes;
        self
    }

    /// Sets the result pages returned for every execution, in order.
    pub fn with_pages(mut self, pages: Vec<Vec<Vec<String>>>) -> Self {
        self.pages = pages;
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| MedstoreError::internal("mock query service lock poisoned"))
    }

    /// Statements submitted so far, in order.
    pub fn submitted(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.submitted.clone())
            .unwrap_or_default()
    }

    /// Number of `get_execution` calls made.
    pub fn status_polls(&self) -> usize {
        self.state.lock().map(|s| s.status_polls).unwrap_or(0)
    }

    /// Number of `get_results_page` calls made.
    pub fn result_calls(&self) -> usize {
        self.state.lock().map(|s| s.result_calls).unwrap_or(0)
    }
}

#[async_trait]
impl QueryService for MockQueryService {
    async fn start_query(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
    ) -> Result<String> {
        let mut state = self.state()?;
        let id = format!("mock-exec-{}", state.submitted.len() + 1);

        state.submitted.push(sql.to_string());
        state.executions.insert(
            id.clone(),
            Execution {
                snapshot: QueryExecution {
                    id: id.clone(),
                    sql: sql.to_string(),
                    database: database.to_string(),
                    output_location: output_location.to_string(),
                    state: QueryState::Queued,
                    state_reason: None,
                    statistics: QueryStatistics::default(),
                },
                remaining: self.script.iter().cloned().collect(),
            },
        );
        Ok(id)
    }

    async fn get_execution(&self, execution_id: &str) -> Result<QueryExecution> {
        let mut state = self.state()?;
        state.status_polls += 1;

        let execution = state.executions.get_mut(execution_id).ok_or_else(|| {
            MedstoreError::InvalidRequest(format!(
                "GetQueryExecution {execution_id}: QueryExecution was not found"
            ))
        })?;

        if let Some(next) = execution.remaining.pop_front() {
            execution.snapshot.state = next;
        }
        if execution.snapshot.state.is_terminal() {
            execution.snapshot.state_reason = self.reason.clone();
            execution.snapshot.statistics = QueryStatistics {
                data_scanned_bytes: Some(self.bytes_scanned),
                engine_execution_millis: Some(0),
            };
        }
        Ok(execution.snapshot.clone())
    }

    async fn get_results_page(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
    ) -> Result<ResultPage> {
        let mut state = self.state()?;
        state.result_calls += 1;

        if !state.executions.contains_key(execution_id) {
            return Err(MedstoreError::InvalidRequest(format!(
                "GetQueryResults {execution_id}: QueryExecution was not found"
            )));
        }

        let index = match next_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                MedstoreError::InvalidRequest(format!("GetQueryResults: bad token '{token}'"))
            })?,
            None => 0,
        };
        let rows = self.pages.get(index).cloned().unwrap_or_default();
        let next_token = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());

        Ok(ResultPage { rows, next_token })
    }
}
