//! Handlers for `medstore athena` commands.

use super::{CommandContext, CommandOutput};
use crate::athena::ResultSet;
use crate::cli::{AthenaArgs, AthenaCommand};
use crate::config::BucketRole;
use crate::error::Result;
use crate::query::{self, PollSettings, QueryRunner};

/// Runs one `athena` subcommand.
pub async fn run(ctx: &CommandContext<'_>, args: &AthenaArgs) -> Result<CommandOutput> {
    query::validate_identifier("database", &args.database)?;
    query::validate_identifier("table", &args.table)?;

    let config = ctx.load_config()?;
    let output_bucket = config.require(BucketRole::QueryOutput)?;

    let poll = PollSettings {
        timeout: PollSettings::from_timeout_secs(args.timeout).timeout,
        ..ctx.poll
    };
    let runner = QueryRunner::new(ctx.queries, ctx.store, &args.database, output_bucket)
        .with_poll_settings(poll)
        .with_result_date(ctx.today);

    match &args.command {
        AthenaCommand::Setup => {
            let data_bucket = config.require(BucketRole::Data)?;
            query::setup_catalog(&runner, &args.table, data_bucket, ctx.cancel).await?;
            Ok(CommandOutput::info(format!(
                "Athena database '{}' and table '{}' created over s3://{}/.",
                args.database, args.table, data_bucket
            )))
        }
        AthenaCommand::Describe => {
            let rows = query::describe_table(&runner, &args.table, ctx.cancel).await?;
            Ok(CommandOutput::multiple(vec![
                CommandOutput::info(format!("Table {}.{}:", args.database, args.table)),
                describe_table_output(&rows),
            ]))
        }
        AthenaCommand::RunQuery { sql } => run_query(&runner, sql, ctx).await,
        AthenaCommand::PerformanceTest { sql, iterations } => {
            let report = query::benchmark(&runner, sql, *iterations, ctx.cancel).await?;
            Ok(CommandOutput::multiple(vec![
                CommandOutput::info(format!(
                    "Performance test: {} of {} iterations succeeded",
                    report.succeeded, report.iterations
                )),
                CommandOutput::info(format!(
                    "Average execution time: {:.2} seconds",
                    report.average_seconds()
                )),
                CommandOutput::info(format!(
                    "Average data scanned: {:.2} KB",
                    report.average_kilobytes_scanned()
                )),
            ]))
        }
    }
}

async fn run_query(
    runner: &QueryRunner<'_>,
    sql: &str,
    ctx: &CommandContext<'_>,
) -> Result<CommandOutput> {
    let outcome = runner.run(sql, ctx.cancel).await?;

    let mut lines = vec![CommandOutput::info(format!(
        "Athena query '{}' ended with state: {}.",
        outcome.execution.id, outcome.execution.state
    ))];

    match (outcome.rows, outcome.stored_as) {
        (Some(rows), Some(stored_as)) => {
            lines.push(result_table(rows));
            lines.push(CommandOutput::info(format!(
                "Results stored with filename: {stored_as}"
            )));
        }
        _ => lines.push(CommandOutput::info(
            "Non-SELECT query executed successfully. No results to store.",
        )),
    }
    Ok(CommandOutput::multiple(lines))
}

fn result_table(set: ResultSet) -> CommandOutput {
    let mut rows = set.rows.into_iter();
    let headers = rows.next().unwrap_or_default();
    CommandOutput::table(headers, rows.collect())
}

/// DESCRIBE returns one tab-separated cell per line; split it into columns.
fn describe_table_output(set: &ResultSet) -> CommandOutput {
    let rows = set
        .rows
        .iter()
        .filter_map(|row| row.first())
        .map(|line| line.split('\t').map(|c| c.trim().to_string()).collect::<Vec<_>>())
        .filter(|cells: &Vec<String>| cells.iter().any(|c| !c.is_empty()))
        .map(|mut cells| {
            cells.retain(|c| !c.is_empty());
            cells
        })
        .collect();

    CommandOutput::table(
        vec!["Column".to_string(), "Type".to_string()],
        rows,
    )
}
