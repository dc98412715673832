//! End-to-end tests for `medstore athena` commands.

use super::*;
use medstore::athena::{MockQueryService, QueryState};
use medstore::commands::CommandOutput;
use medstore::storage::MockObjectStore;
use pretty_assertions::assert_eq;

fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
    cells
        .iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}

#[tokio::test]
async fn test_setup_creates_database_and_table() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    let queries = MockQueryService::new();

    let output = run(&workspace, &store, &queries, &["athena", "setup"])
        .await
        .unwrap();

    let submitted = queries.submitted();
    assert_eq!(submitted.len(), 3);
    assert_eq!(submitted[0], "CREATE DATABASE IF NOT EXISTS medical_db");
    assert!(submitted[1].starts_with("DROP TABLE IF EXISTS medical_db.patient_data"));
    assert!(submitted[2].contains(&format!("LOCATION 's3://{DATA}/'")));
    assert_eq!(queries.result_calls(), 0);
    assert!(!output.has_errors());
}

#[tokio::test]
async fn test_run_query_stores_named_result() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    store.insert_object(RESULTS, "mock-exec-1.csv", b"patient_id,name\n").unwrap();
    let queries = MockQueryService::new().with_pages(vec![
        rows(&[&["patient_id", "name"], &["P001", "Ada"]]),
        rows(&[&["P002", "Grace"]]),
    ]);

    let output = run(
        &workspace,
        &store,
        &queries,
        &["athena", "run-query", "SELECT patient_id, name FROM medical_db.patient_data"],
    )
    .await
    .unwrap();

    let parts = output.flatten();
    match parts[1] {
        CommandOutput::Table { headers, rows } => {
            assert_eq!(headers, &vec!["patient_id".to_string(), "name".to_string()]);
            assert_eq!(rows.len(), 2);
        }
        other => panic!("unexpected output: {other:?}"),
    }
    assert_eq!(
        parts[2],
        &CommandOutput::info(
            "Results stored with filename: 20241012_patient_data_patient_id_name.csv"
        )
    );
    assert_eq!(
        store.object_body(RESULTS, "20241012_patient_data_patient_id_name.csv"),
        Some(b"patient_id,name\n".to_vec())
    );
}

#[tokio::test]
async fn test_run_non_select_stores_nothing() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    let queries = MockQueryService::new();

    let output = run(
        &workspace,
        &store,
        &queries,
        &["athena", "run-query", "CREATE DATABASE IF NOT EXISTS clinic"],
    )
    .await
    .unwrap();

    assert_eq!(
        lines(&output).last().unwrap(),
        "Non-SELECT query executed successfully. No results to store."
    );
    assert!(store.copies().is_empty());
    assert_eq!(queries.result_calls(), 0);
}

#[tokio::test]
async fn test_failed_query_is_reported() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    let queries = MockQueryService::new()
        .with_states(vec![QueryState::Running, QueryState::Failed])
        .with_reason("SYNTAX_ERROR: line 1:8: Column 'nope' cannot be resolved");

    let err = run(
        &workspace,
        &store,
        &queries,
        &["athena", "run-query", "SELECT nope FROM patient_data"],
    )
    .await
    .unwrap_err();

    assert_eq!(err.category(), "Query Failed");
    assert!(err.to_string().contains("SYNTAX_ERROR"));
    assert!(store.copies().is_empty());
}

#[tokio::test]
async fn test_describe_lists_columns() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    let queries = MockQueryService::new().with_pages(vec![rows(&[
        &["patient_id          \tstring              \t"],
        &["age                 \tint                 \t"],
    ])]);

    let output = run(&workspace, &store, &queries, &["athena", "describe"])
        .await
        .unwrap();

    assert_eq!(queries.submitted(), vec!["DESCRIBE medical_db.patient_data"]);
    assert!(output
        .to_string()
        .contains("patient_id | string"));
    assert!(store.copies().is_empty());
}

#[tokio::test]
async fn test_performance_test_averages() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    let queries = MockQueryService::new().with_bytes_scanned(2048);

    let output = run(
        &workspace,
        &store,
        &queries,
        &[
            "athena",
            "performance-test",
            "SELECT * FROM patient_data",
            "--iterations",
            "3",
        ],
    )
    .await
    .unwrap();

    let text = lines(&output);
    assert_eq!(text[0], "Performance test: 3 of 3 iterations succeeded");
    assert!(text[1].starts_with("Average execution time: "));
    assert_eq!(text[2], "Average data scanned: 2.00 KB");
    assert_eq!(queries.submitted().len(), 3);
    assert_eq!(queries.result_calls(), 0);
}

#[tokio::test]
async fn test_athena_requires_query_output_bucket() {
    let workspace = Workspace::new();
    let store = MockObjectStore::new();
    let queries = MockQueryService::new();

    let err = run(&workspace, &store, &queries, &["athena", "run-query", "SELECT 1"])
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Configuration Error");
    assert!(queries.submitted().is_empty());
}

#[tokio::test]
async fn test_invalid_table_name_rejected() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    let queries = MockQueryService::new();

    let err = run(
        &workspace,
        &store,
        &queries,
        &["athena", "describe", "--table", "patients; DROP"],
    )
    .await
    .unwrap_err();

    assert_eq!(err.category(), "Invalid Input");
    assert!(queries.submitted().is_empty());
}
