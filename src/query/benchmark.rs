//! Repeated execution of a statement to measure latency and scan volume.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::runner::QueryRunner;
use crate::athena::QueryState;
use crate::error::{MedstoreError, Result};

/// Averages over the successful iterations of a benchmark.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkReport {
    pub iterations: u32,
    pub succeeded: u32,
    pub average_duration: Duration,
    pub average_bytes_scanned: f64,
}

impl BenchmarkReport {
    pub fn average_seconds(&self) -> f64 {
        self.average_duration.as_secs_f64()
    }

    pub fn average_kilobytes_scanned(&self) -> f64 {
        self.average_bytes_scanned / 1024.0
    }
}

/// Runs `sql` `iterations` times, one after another.
///
/// Each iteration is timed from submission to its terminal state. Failed
/// iterations are logged and left out of the averages; results are never
/// fetched.
pub async fn benchmark(
    runner: &QueryRunner<'_>,
    sql: &str,
    iterations: u32,
    cancel: &CancellationToken,
) -> Result<BenchmarkReport> {
    if iterations == 0 {
        return Err(MedstoreError::invalid_input(
            "Iterations must be at least 1",
        ));
    }

    let mut succeeded = 0u32;
    let mut total_duration = Duration::ZERO;
    let mut total_bytes: i64 = 0;

    for iteration in 1..=iterations {
        let started = Instant::now();
        let id = runner.submit(sql).await?;
        let execution = runner.wait_for_completion(&id, cancel).await?;
        let elapsed = started.elapsed();

        if execution.state == QueryState::Succeeded {
            succeeded += 1;
            total_duration += elapsed;
            total_bytes += execution.statistics.data_scanned_bytes.unwrap_or_default();
            info!(
                "Iteration {}/{}: {:.2}s",
                iteration,
                iterations,
                elapsed.as_secs_f64()
            );
        } else {
            warn!(
                "Iteration {}/{} ended with state {}: {}",
                iteration,
                iterations,
                execution.state,
                execution.state_reason.as_deref().unwrap_or("no reason given")
            );
        }
    }

    if succeeded == 0 {
        return Err(MedstoreError::Service(format!(
            "None of the {iterations} benchmark iterations succeeded"
        )));
    }

    Ok(BenchmarkReport {
        iterations,
        succeeded,
        average_duration: total_duration / succeeded,
        average_bytes_scanned: total_bytes as f64 / f64::from(succeeded),
    })
}
