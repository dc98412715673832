//! Database and table registration for the patient data set.

use regex::Regex;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::runner::QueryRunner;
use crate::athena::ResultSet;
use crate::error::{MedstoreError, Result};
use crate::provision::validate_bucket_name;

/// Column definitions of the patient CSV files.
pub const PATIENT_COLUMNS: [(&str, &str); 10] = [
    ("patient_id", "STRING"),
    ("name", "STRING"),
    ("age", "INT"),
    ("gender", "STRING"),
    ("condition", "STRING"),
    ("admission_date", "STRING"),
    ("doctor", "STRING"),
    ("blood_type", "STRING"),
    ("weight_kg", "DOUBLE"),
    ("height_cm", "DOUBLE"),
];

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// Rejects database and table names that cannot be spliced into DDL as-is.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(MedstoreError::invalid_input(format!(
            "Invalid {kind} name '{name}': use letters, digits and underscores, not starting with a digit"
        )))
    }
}

pub fn create_database_sql(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {database}")
}

pub fn drop_table_sql(database: &str, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {database}.{table}")
}

/// DDL registering the CSV files under `s3://<data_bucket>/` as a table.
pub fn create_table_sql(database: &str, table: &str, data_bucket: &str) -> String {
    let columns = PATIENT_COLUMNS
        .iter()
        .map(|(name, ty)| format!("    {name} {ty}"))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "CREATE EXTERNAL TABLE {database}.{table} (\n{columns}\n)\n\
         ROW FORMAT SERDE 'org.apache.hadoop.hive.serde2.OpenCSVSerde'\n\
         WITH SERDEPROPERTIES (\n    'separatorChar' = ',',\n    'skip.header.line.count' = '1'\n)\n\
         STORED AS TEXTFILE\n\
         LOCATION 's3://{data_bucket}/'\n\
         TBLPROPERTIES ('has_encrypted_data'='true')"
    )
}

/// Creates the database if needed and recreates the patient table.
///
/// The three statements run in order; the first failure stops the sequence.
pub async fn setup_catalog(
    runner: &QueryRunner<'_>,
    table: &str,
    data_bucket: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let database = runner.database();
    validate_identifier("database", database)?;
    validate_identifier("table", table)?;
    validate_bucket_name(data_bucket)?;

    for sql in [
        create_database_sql(database),
        drop_table_sql(database, table),
        create_table_sql(database, table, data_bucket),
    ] {
        runner.run(&sql, cancel).await?;
    }

    info!("Table {}.{} registered over s3://{}/", database, table, data_bucket);
    Ok(())
}

/// Returns the column listing of a table.
pub async fn describe_table(
    runner: &QueryRunner<'_>,
    table: &str,
    cancel: &CancellationToken,
) -> Result<ResultSet> {
    let database = runner.database();
    validate_identifier("database", database)?;
    validate_identifier("table", table)?;

    let execution = runner
        .execute(&format!("DESCRIBE {database}.{table}"), cancel)
        .await?;
    runner.fetch_results(&execution.id).await
}
