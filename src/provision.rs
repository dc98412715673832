//! Bucket provisioning and teardown.
//!
//! Buckets are created idempotently and then receive four independent
//! policies: versioning, lifecycle tiers, the Athena access policy and default
//! encryption. Deletion empties a bucket of every version before removing it
//! and reports the result as a value.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{MedstoreError, Result};
use crate::storage::{
    athena_access_policy, BucketCreation, DefaultEncryption, LifecyclePolicy, ObjectStore,
};

/// Versions removed per `DeleteObjects` request.
pub const DELETE_BATCH_SIZE: usize = 1000;

pub const IMAGES_BUCKET_PREFIX: &str = "medical-images";
pub const DATA_BUCKET_PREFIX: &str = "patient-data";
pub const QUERY_OUTPUT_BUCKET_PREFIX: &str = "athena-query-results";

static BUCKET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid bucket name pattern")
});

/// Rejects names S3 would refuse, before any request is made.
pub fn validate_bucket_name(name: &str) -> Result<()> {
    if BUCKET_NAME.is_match(name) && !name.contains("..") {
        Ok(())
    } else {
        Err(MedstoreError::invalid_input(format!(
            "Invalid bucket name '{name}': use 3-63 lowercase letters, digits, '.' or '-', \
             starting and ending with a letter or digit"
        )))
    }
}

/// Whether `ensure_bucket` had to create the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyExists,
}

/// Policies attached to every provisioned bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStep {
    Versioning,
    Lifecycle,
    AccessPolicy,
    Encryption,
}

impl PolicyStep {
    pub const ALL: [PolicyStep; 4] = [
        Self::Versioning,
        Self::Lifecycle,
        Self::AccessPolicy,
        Self::Encryption,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Versioning => "versioning",
            Self::Lifecycle => "lifecycle policy",
            Self::AccessPolicy => "Athena access policy",
            Self::Encryption => "default encryption",
        }
    }
}

impl fmt::Display for PolicyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one policy step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: PolicyStep,
    /// `None` on success.
    pub error: Option<String>,
}

/// What `provision` did to one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub bucket: String,
    pub outcome: EnsureOutcome,
    pub steps: Vec<StepOutcome>,
}

impl ProvisionReport {
    /// True when every policy step succeeded.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.error.is_none())
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.error.is_some())
    }
}

/// Per-bucket result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub bucket: String,
    pub error: Option<String>,
}

impl DeletionOutcome {
    pub fn is_deleted(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for DeletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "Bucket '{}' has been deleted.", self.bucket),
            Some(reason) => write!(f, "Error deleting bucket '{}': {}", self.bucket, reason),
        }
    }
}

/// Bucket operations shared by setup, delete and encryption commands.
pub struct Provisioner<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> Provisioner<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Creates the bucket unless it already exists.
    pub async fn ensure_bucket(&self, name: &str, region: &str) -> Result<EnsureOutcome> {
        validate_bucket_name(name)?;

        if self.store.bucket_exists(name).await? {
            info!("Bucket '{}' already exists", name);
            return Ok(EnsureOutcome::AlreadyExists);
        }

        match self.store.create_bucket(name, region).await? {
            BucketCreation::Created => {
                info!("Bucket '{}' created in {}", name, region);
                Ok(EnsureOutcome::Created)
            }
            BucketCreation::AlreadyOwned => Ok(EnsureOutcome::AlreadyExists),
        }
    }

    /// Applies one policy to an existing bucket.
    pub async fn apply_policy(&self, bucket: &str, step: PolicyStep) -> Result<()> {
        match step {
            PolicyStep::Versioning => self.store.enable_versioning(bucket).await,
            PolicyStep::Lifecycle => {
                self.store
                    .put_lifecycle(bucket, &LifecyclePolicy::healthcare())
                    .await
            }
            PolicyStep::AccessPolicy => {
                let document = athena_access_policy(bucket).to_string();
                self.store.put_bucket_policy(bucket, &document).await
            }
            PolicyStep::Encryption => {
                self.store
                    .put_default_encryption(bucket, DefaultEncryption::Aes256)
                    .await
            }
        }
    }

    /// Ensures the bucket exists and applies every policy.
    ///
    /// A failing policy is recorded in the report and does not stop the
    /// remaining ones. Nothing is rolled back.
    pub async fn provision(&self, name: &str, region: &str) -> Result<ProvisionReport> {
        let outcome = self.ensure_bucket(name, region).await?;

        let mut steps = Vec::with_capacity(PolicyStep::ALL.len());
        for step in PolicyStep::ALL {
            let error = match self.apply_policy(name, step).await {
                Ok(()) => {
                    info!("Applied {} to '{}'", step, name);
                    None
                }
                Err(e) => {
                    warn!("Failed to apply {} to '{}': {}", step, name, e);
                    Some(e.to_string())
                }
            };
            steps.push(StepOutcome { step, error });
        }

        Ok(ProvisionReport {
            bucket: name.to_string(),
            outcome,
            steps,
        })
    }

    /// Creates and provisions the three role buckets under fresh names.
    ///
    /// Returns the configuration naming them along with one report per bucket.
    /// Stops at the first bucket that cannot be created.
    pub async fn setup_buckets(&self, region: &str) -> Result<(Config, Vec<ProvisionReport>)> {
        let [images, data, query_output] = generate_bucket_names();

        let mut reports = Vec::with_capacity(3);
        for name in [&images, &data, &query_output] {
            reports.push(self.provision(name, region).await?);
        }

        Ok((Config::with_buckets(images, data, query_output), reports))
    }

    /// Deletes every version and delete marker, then the bucket itself.
    pub async fn delete_bucket(&self, name: &str) -> DeletionOutcome {
        let error = match self.empty_and_delete(name).await {
            Ok(()) => {
                info!("Bucket '{}' has been deleted", name);
                None
            }
            Err(e) => {
                warn!("Error deleting bucket '{}': {}", name, e);
                Some(e.to_string())
            }
        };

        DeletionOutcome {
            bucket: name.to_string(),
            error,
        }
    }

    /// Deletes several buckets, one outcome per name in the given order.
    pub async fn delete_buckets(&self, names: &[String]) -> Vec<DeletionOutcome> {
        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            outcomes.push(self.delete_bucket(name).await);
        }
        outcomes
    }

    async fn empty_and_delete(&self, name: &str) -> Result<()> {
        let versions = self.store.list_object_versions(name, None).await?;

        for batch in versions.chunks(DELETE_BATCH_SIZE) {
            self.store.delete_versions(name, batch).await?;
        }
        if !versions.is_empty() {
            info!("Removed {} versions from '{}'", versions.len(), name);
        }

        self.store.delete_bucket(name).await
    }
}

/// Generates unique names for the images, data and query output buckets.
pub fn generate_bucket_names() -> [String; 3] {
    [
        IMAGES_BUCKET_PREFIX,
        DATA_BUCKET_PREFIX,
        QUERY_OUTPUT_BUCKET_PREFIX,
    ]
    .map(|prefix| format!("{prefix}-{}", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockObjectStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate_bucket_name() {
        assert!(validate_bucket_name("patient-data-1").is_ok());
        assert!(validate_bucket_name("a.b.c").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("Patient-Data").is_err());
        assert!(validate_bucket_name("-leading").is_err());
        assert!(validate_bucket_name("trailing-").is_err());
        assert!(validate_bucket_name("under_score").is_err());
        assert!(validate_bucket_name("double..dot").is_err());
        assert!(validate_bucket_name(&"a".repeat(63)).is_ok());
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_generated_names_are_valid_and_distinct() {
        let names = generate_bucket_names();
        assert!(names[0].starts_with("medical-images-"));
        assert!(names[1].starts_with("patient-data-"));
        assert!(names[2].starts_with("athena-query-results-"));
        for name in &names {
            validate_bucket_name(name).unwrap();
        }
        assert_ne!(generate_bucket_names()[0], names[0]);
    }

    #[tokio::test]
    async fn test_ensure_bucket_is_idempotent() {
        let store = MockObjectStore::new();
        let provisioner = Provisioner::new(&store);

        let first = provisioner.ensure_bucket("records", "eu-west-1").await.unwrap();
        let second = provisioner.ensure_bucket("records", "eu-west-1").await.unwrap();

        assert_eq!(first, EnsureOutcome::Created);
        assert_eq!(second, EnsureOutcome::AlreadyExists);
        assert_eq!(store.bucket_count(), 1);
        assert_eq!(store.bucket_region("records").as_deref(), Some("eu-west-1"));
    }

    #[tokio::test]
    async fn test_invalid_name_makes_no_call() {
        let store = MockObjectStore::new();
        store.fail_on("bucket_exists");
        let provisioner = Provisioner::new(&store);

        let err = provisioner
            .ensure_bucket("Bad_Name", "us-east-1")
            .await
            .unwrap_err();
        assert_eq!(err.category(), "Invalid Input");
    }

    #[tokio::test]
    async fn test_provision_applies_all_policies() {
        let store = MockObjectStore::new();
        let provisioner = Provisioner::new(&store);

        let report = provisioner.provision("records", "us-east-1").await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.steps.len(), 4);
        assert!(store.versioning_enabled("records"));
        assert_eq!(store.lifecycle("records"), Some(LifecyclePolicy::healthcare()));
        assert_eq!(store.encryption("records"), Some(DefaultEncryption::Aes256));
        let policy: serde_json::Value =
            serde_json::from_str(&store.bucket_policy("records").unwrap()).unwrap();
        assert_eq!(
            policy["Statement"][0]["Resource"][0],
            "arn:aws:s3:::records"
        );
    }

    #[tokio::test]
    async fn test_failed_policy_does_not_stop_others() {
        let store = MockObjectStore::new();
        store.fail_on("put_lifecycle");
        let provisioner = Provisioner::new(&store);

        let report = provisioner.provision("records", "us-east-1").await.unwrap();

        assert!(!report.is_complete());
        let failed: Vec<PolicyStep> = report.failed_steps().map(|s| s.step).collect();
        assert_eq!(failed, vec![PolicyStep::Lifecycle]);
        assert!(store.versioning_enabled("records"));
        assert!(store.bucket_policy("records").is_some());
        assert_eq!(store.encryption("records"), Some(DefaultEncryption::Aes256));
    }

    #[tokio::test]
    async fn test_setup_buckets_returns_config() {
        let store = MockObjectStore::new();
        let provisioner = Provisioner::new(&store);

        let (config, reports) = provisioner.setup_buckets("us-east-1").await.unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(store.bucket_count(), 3);
        assert!(config
            .images_bucket
            .as_deref()
            .unwrap()
            .starts_with("medical-images-"));
        assert!(store.has_bucket(config.data_bucket.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn test_delete_bucket_removes_all_versions_in_batches() {
        let store = MockObjectStore::with_buckets(&["records"]);
        store.enable_versioning("records").await.unwrap();
        for i in 0..1200 {
            store
                .insert_object("records", &format!("k{}", i % 700), b"x")
                .unwrap();
        }
        store.delete_object("records", "k1", None).await.unwrap();

        let outcome = Provisioner::new(&store).delete_bucket("records").await;

        assert!(outcome.is_deleted());
        assert_eq!(outcome.to_string(), "Bucket 'records' has been deleted.");
        assert_eq!(store.delete_batches(), vec![1000, 201]);
        assert!(!store.has_bucket("records"));
    }

    #[tokio::test]
    async fn test_delete_missing_bucket_reports_message() {
        let store = MockObjectStore::new();

        let outcome = Provisioner::new(&store).delete_bucket("ghost").await;

        assert!(!outcome.is_deleted());
        let message = outcome.to_string();
        assert!(message.starts_with("Error deleting bucket 'ghost': "));
        assert!(message.contains("does not exist"));
    }

    #[tokio::test]
    async fn test_delete_buckets_keeps_input_order() {
        let store = MockObjectStore::with_buckets(&["alpha", "gamma"]);
        let names = vec!["gamma".to_string(), "beta".to_string(), "alpha".to_string()];

        let outcomes = Provisioner::new(&store).delete_buckets(&names).await;

        let buckets: Vec<&str> = outcomes.iter().map(|o| o.bucket.as_str()).collect();
        assert_eq!(buckets, vec!["gamma", "beta", "alpha"]);
        assert!(outcomes[0].is_deleted());
        assert!(!outcomes[1].is_deleted());
        assert!(outcomes[2].is_deleted());
    }
}
