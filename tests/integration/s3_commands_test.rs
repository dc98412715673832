//! End-to-end tests for `medstore s3` commands.

use super::*;
use medstore::athena::MockQueryService;
use medstore::commands::CommandOutput;
use medstore::config::BucketRole;
use medstore::storage::{MockObjectStore, ObjectStore};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_setup_provisions_buckets_and_writes_config() {
    let workspace = Workspace::new();
    let store = MockObjectStore::new();
    let queries = MockQueryService::new();

    let output = run(&workspace, &store, &queries, &["s3", "setup"])
        .await
        .unwrap();

    assert!(!output.has_errors());
    let config = workspace.config();
    for role in BucketRole::ALL {
        let bucket = config.require(role).unwrap();
        assert!(store.has_bucket(bucket));
        assert_eq!(store.bucket_region(bucket).as_deref(), Some("eu-west-1"));
        assert!(store.versioning_enabled(bucket));
        assert!(store.lifecycle(bucket).is_some());
        assert!(store.bucket_policy(bucket).is_some());
        assert!(store.encryption(bucket).is_some());
    }
    assert!(config
        .require(BucketRole::Images)
        .unwrap()
        .starts_with("medical-images-"));

    let text = lines(&output);
    assert_eq!(
        text.last().unwrap(),
        &format!(
            "Setup complete. Bucket names saved to '{}'.",
            workspace.config_path().display()
        )
    );
}

#[tokio::test]
async fn test_setup_reports_policy_failures_and_continues() {
    let workspace = Workspace::new();
    let store = MockObjectStore::new();
    store.fail_on("put_lifecycle");
    let queries = MockQueryService::new();

    let output = run(&workspace, &store, &queries, &["s3", "setup"])
        .await
        .unwrap();

    assert!(output.has_errors());
    assert_eq!(store.bucket_count(), 3);
    let config = workspace.config();
    let data = config.require(BucketRole::Data).unwrap();
    assert!(store.lifecycle(data).is_none());
    assert!(store.encryption(data).is_some());
}

#[tokio::test]
async fn test_setup_fails_when_bucket_creation_fails() {
    let workspace = Workspace::new();
    let store = MockObjectStore::new();
    store.fail_on("create_bucket");
    let queries = MockQueryService::new();

    let err = run(&workspace, &store, &queries, &["s3", "setup"])
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Service Error");
    assert!(!workspace.config_path().exists());
}

#[tokio::test]
async fn test_delete_bucket_clears_config_roles() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    store.insert_object(DATA, "patients.csv", b"id,name\n").unwrap();
    let queries = MockQueryService::new();

    let output = run(
        &workspace,
        &store,
        &queries,
        &["s3", "delete-bucket", DATA, "missing-bucket"],
    )
    .await
    .unwrap();

    let text = lines(&output);
    assert_eq!(text[0], format!("Bucket '{DATA}' has been deleted."));
    assert!(text[1].starts_with("Error deleting bucket 'missing-bucket':"));
    assert_eq!(text[2], "Config file updated.");
    assert!(output.has_errors());

    let config = workspace.config();
    assert_eq!(config.bucket(BucketRole::Data), None);
    assert_eq!(config.bucket(BucketRole::Images), Some(IMAGES));
    assert!(!store.has_bucket(DATA));
}

#[tokio::test]
async fn test_delete_bucket_reports_outcomes_when_config_is_malformed() {
    let workspace = Workspace::new();
    std::fs::write(workspace.config_path(), "{ not json").unwrap();
    let store = store_with_buckets();
    let queries = MockQueryService::new();

    let output = run(&workspace, &store, &queries, &["s3", "delete-bucket", IMAGES])
        .await
        .unwrap();

    let text = lines(&output);
    assert_eq!(text[0], format!("Bucket '{IMAGES}' has been deleted."));
    assert!(text[1].starts_with("Could not update config: "));
    assert!(output.has_errors());
    assert!(!store.has_bucket(IMAGES));
    assert_eq!(
        std::fs::read_to_string(workspace.config_path()).unwrap(),
        "{ not json"
    );
}

#[tokio::test]
async fn test_delete_bucket_without_config() {
    let workspace = Workspace::new();
    let store = store_with_buckets();
    let queries = MockQueryService::new();

    let output = run(&workspace, &store, &queries, &["s3", "delete-bucket", IMAGES])
        .await
        .unwrap();

    assert_eq!(lines(&output), vec![format!("Bucket '{IMAGES}' has been deleted.")]);
    assert!(!workspace.config_path().exists());
}

#[tokio::test]
async fn test_list_buckets_formats() {
    let workspace = Workspace::new();
    let store = MockObjectStore::with_buckets(&["a-bucket", "b-bucket"]);
    let queries = MockQueryService::new();

    let output = run(&workspace, &store, &queries, &["s3", "list-buckets", "--collection"])
        .await
        .unwrap();
    assert_eq!(output, CommandOutput::info("a-bucket b-bucket"));

    let output = run(&workspace, &store, &queries, &["s3", "list-buckets", "--nodate"])
        .await
        .unwrap();
    assert_eq!(
        output,
        CommandOutput::info("Existing S3 buckets:\n- a-bucket\n- b-bucket")
    );
}

#[tokio::test]
async fn test_upload_routes_by_content_type() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    let queries = MockQueryService::new();

    let scan = workspace.path().join("scan.png");
    std::fs::write(&scan, b"png").unwrap();
    let records = workspace.path().join("records.csv");
    std::fs::write(&records, b"id\n1\n").unwrap();

    run(&workspace, &store, &queries, &["s3", "upload", scan.to_str().unwrap()])
        .await
        .unwrap();
    run(&workspace, &store, &queries, &["s3", "upload", records.to_str().unwrap()])
        .await
        .unwrap();

    assert_eq!(store.object_body(IMAGES, "scan.png"), Some(b"png".to_vec()));
    assert_eq!(store.content_type(IMAGES, "scan.png").as_deref(), Some("image/png"));
    assert_eq!(store.object_body(DATA, "records.csv"), Some(b"id\n1\n".to_vec()));
    assert_eq!(store.content_type(DATA, "records.csv").as_deref(), Some("text/csv"));
}

#[tokio::test]
async fn test_upload_missing_file_is_invalid_input() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    let queries = MockQueryService::new();
    let missing = workspace.path().join("nope.csv");

    let err = run(&workspace, &store, &queries, &["s3", "upload", missing.to_str().unwrap()])
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Invalid Input");
}

#[tokio::test]
async fn test_download_writes_dated_file() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    store.insert_object(DATA, "reports/summary.txt", b"ok").unwrap();
    let queries = MockQueryService::new();
    let out_dir = workspace.path().join("downloads");

    run(
        &workspace,
        &store,
        &queries,
        &[
            "s3",
            "download",
            "reports/summary.txt",
            "--output-dir",
            out_dir.to_str().unwrap(),
        ],
    )
    .await
    .unwrap();

    let written = std::fs::read(out_dir.join("dl_20241012_summary.txt")).unwrap();
    assert_eq!(written, b"ok");
}

#[tokio::test]
async fn test_commands_without_config_fail() {
    let workspace = Workspace::new();
    let store = store_with_buckets();
    let queries = MockQueryService::new();

    let err = run(&workspace, &store, &queries, &["s3", "delete-file", "p.csv"])
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Configuration Error");
    assert!(err.to_string().contains("Please run the setup command first"));
}

#[tokio::test]
async fn test_delete_and_restore_version() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    store.enable_versioning(DATA).await.unwrap();
    store.insert_object(DATA, "p.csv", b"first").unwrap();
    store.insert_object(DATA, "p.csv", b"second").unwrap();
    let queries = MockQueryService::new();

    let first = store
        .list_object_versions(DATA, Some("p.csv"))
        .await
        .unwrap()
        .into_iter()
        .find(|v| !v.is_latest)
        .unwrap()
        .version_id;

    run(&workspace, &store, &queries, &["s3", "delete-file", "p.csv"])
        .await
        .unwrap();
    assert_eq!(store.object_body(DATA, "p.csv"), None);

    let output = run(
        &workspace,
        &store,
        &queries,
        &["s3", "restore-version", "p.csv", first.as_str()],
    )
    .await
    .unwrap();

    assert_eq!(
        lines(&output),
        vec![
            "Removed delete marker for p.csv".to_string(),
            format!("Restored version {first} of p.csv"),
        ]
    );
    assert_eq!(store.object_body(DATA, "p.csv"), Some(b"first".to_vec()));
}

#[tokio::test]
async fn test_restore_unknown_version() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    store.insert_object(DATA, "p.csv", b"x").unwrap();
    let queries = MockQueryService::new();

    let output = run(
        &workspace,
        &store,
        &queries,
        &["s3", "restore-version", "p.csv", "v999"],
    )
    .await
    .unwrap();

    assert_eq!(
        output,
        CommandOutput::error("Version v999 of p.csv does not exist.")
    );
}

#[tokio::test]
async fn test_storage_class_round_trip() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    store.insert_object(DATA, "p.csv", b"x").unwrap();
    let queries = MockQueryService::new();

    let before = run(&workspace, &store, &queries, &["s3", "storage-class", "p.csv"])
        .await
        .unwrap();
    assert_eq!(
        before,
        CommandOutput::info(format!("Storage class of 'p.csv' in '{DATA}': STANDARD"))
    );

    run(
        &workspace,
        &store,
        &queries,
        &["s3", "set-storage-class", "p.csv", "GLACIER"],
    )
    .await
    .unwrap();

    let after = run(&workspace, &store, &queries, &["s3", "storage-class", "p.csv"])
        .await
        .unwrap();
    assert_eq!(
        after,
        CommandOutput::info(format!("Storage class of 'p.csv' in '{DATA}': GLACIER"))
    );
}

#[tokio::test]
async fn test_read_and_presign() {
    let workspace = Workspace::configured();
    let store = store_with_buckets();
    store.insert_object(DATA, "notes.txt", b"hello").unwrap();
    let queries = MockQueryService::new();

    let read = run(&workspace, &store, &queries, &["s3", "read", "notes.txt"])
        .await
        .unwrap();
    assert_eq!(read, CommandOutput::info("hello"));

    let url = run(
        &workspace,
        &store,
        &queries,
        &["s3", "presigned-url", "notes.txt", "--expiration", "60"],
    )
    .await
    .unwrap();
    let text = url.to_string();
    assert!(text.starts_with("Presigned URL for notes.txt (expires in 60 seconds):\n"));
    assert!(text.contains("X-Amz-Expires=60"));

    let err = run(
        &workspace,
        &store,
        &queries,
        &["s3", "presigned-url", "notes.txt", "--expiration", "0"],
    )
    .await
    .unwrap_err();
    assert_eq!(err.category(), "Invalid Input");
}

#[tokio::test]
async fn test_list_contents_empty_and_populated() {
    let workspace = Workspace::new();
    let store = store_with_buckets();
    let queries = MockQueryService::new();

    let empty = run(&workspace, &store, &queries, &["s3", "list-contents", IMAGES])
        .await
        .unwrap();
    assert_eq!(
        empty,
        CommandOutput::info(format!("No objects found in bucket '{IMAGES}'."))
    );

    store.insert_object(IMAGES, "scan.png", b"1234").unwrap();
    let listed = run(&workspace, &store, &queries, &["s3", "list-contents", IMAGES])
        .await
        .unwrap();
    assert_eq!(
        listed,
        CommandOutput::info(format!(
            "Contents of bucket '{IMAGES}':\n  - Object: scan.png, Size: 4 bytes"
        ))
    );
}
