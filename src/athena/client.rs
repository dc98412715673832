//! Athena implementation of [`QueryService`].

use super::{QueryExecution, QueryService, QueryState, QueryStatistics, ResultPage};
use crate::aws::classify_sdk_error;
use crate::error::{MedstoreError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_athena::types::{QueryExecutionContext, ResultConfiguration};
use aws_sdk_athena::Client as AthenaClient;
use tracing::debug;

/// Athena-backed query service.
#[derive(Debug, Clone)]
pub struct AthenaQueryService {
    client: AthenaClient,
}

impl AthenaQueryService {
    pub fn new(client: AthenaClient) -> Self {
        Self { client }
    }

    /// Creates a client from a loaded SDK configuration.
    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(AthenaClient::new(config))
    }
}

#[async_trait]
impl QueryService for AthenaQueryService {
    async fn start_query(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
    ) -> Result<String> {
        let output = self
            .client
            .start_query_execution()
            .query_string(sql)
            .query_execution_context(QueryExecutionContext::builder().database(database).build())
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(output_location)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify_sdk_error("StartQueryExecution", e))?;

        let id = output.query_execution_id().ok_or_else(|| {
            MedstoreError::internal("StartQueryExecution returned no execution id")
        })?;
        debug!("Started query execution {}", id);
        Ok(id.to_string())
    }

    async fn get_execution(&self, execution_id: &str) -> Result<QueryExecution> {
        let output = self
            .client
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("GetQueryExecution {execution_id}"), e))?;

        let execution = output.query_execution().ok_or_else(|| {
            MedstoreError::internal(format!(
                "GetQueryExecution {execution_id} returned no execution"
            ))
        })?;
        let status = execution.status();
        let statistics = execution.statistics();

        Ok(QueryExecution {
            id: execution
                .query_execution_id()
                .unwrap_or(execution_id)
                .to_string(),
            sql: execution.query().unwrap_or_default().to_string(),
            database: execution
                .query_execution_context()
                .and_then(|c| c.database())
                .unwrap_or_default()
                .to_string(),
            output_location: execution
                .result_configuration()
                .and_then(|c| c.output_location())
                .unwrap_or_default()
                .to_string(),
            state: status
                .and_then(|s| s.state())
                .map(|s| QueryState::from_service(s.as_str()))
                .unwrap_or(QueryState::Queued),
            state_reason: status
                .and_then(|s| s.state_change_reason())
                .map(str::to_string),
            statistics: QueryStatistics {
                data_scanned_bytes: statistics.and_then(|s| s.data_scanned_in_bytes()),
                engine_execution_millis: statistics.and_then(|s| s.engine_execution_time_in_millis()),
            },
        })
    }

    async fn get_results_page(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
    ) -> Result<ResultPage> {
        let output = self
            .client
            .get_query_results()
            .query_execution_id(execution_id)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("GetQueryResults {execution_id}"), e))?;

        let rows = output
            .result_set()
            .map(|set| {
                set.rows()
                    .iter()
                    .map(|row| {
                        row.data()
                            .iter()
                            .map(|cell| cell.var_char_value().unwrap_or_default().to_string())
                            .collect()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ResultPage {
            rows,
            next_token: output.next_token().map(str::to_string),
        })
    }
}
