//! Object storage abstraction for medstore.
//!
//! Provides a trait-based interface over the bucket and object operations the
//! tool needs, so that the S3 client can be swapped for an in-memory fake.

mod mock;
mod policy;
mod s3;

pub use mock::MockObjectStore;
pub use policy::{
    athena_access_policy, DefaultEncryption, LifecyclePolicy, Transition, TransitionClass,
};
pub use s3::S3ObjectStore;

use crate::error::{MedstoreError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Legacy region where buckets are created without a location constraint.
pub const LEGACY_REGION: &str = "us-east-1";

/// A bucket as reported by `ListBuckets`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub name: String,
    /// Creation timestamp, RFC 3339.
    pub created: Option<String>,
}

/// An object as reported by `ListObjectsV2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
}

/// One entry of a bucket's version history: an object version or a delete marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: String,
    pub is_latest: bool,
    pub is_delete_marker: bool,
    /// Last modification timestamp, RFC 3339.
    pub last_modified: Option<String>,
}

/// Object metadata returned by `HeadObject`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: i64,
    pub content_type: Option<String>,
    /// `None` means the service omitted the header, which S3 does for STANDARD.
    pub storage_class: Option<String>,
}

/// Outcome of a create-bucket call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketCreation {
    Created,
    /// The bucket already existed and belongs to the caller.
    AlreadyOwned,
}

/// A server-side copy inside one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySpec {
    pub source_key: String,
    pub source_version: Option<String>,
    pub destination_key: String,
    pub storage_class: Option<StorageClass>,
}

impl CopySpec {
    /// Copies `source_key` to `destination_key`.
    pub fn new(source_key: impl Into<String>, destination_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            source_version: None,
            destination_key: destination_key.into(),
            storage_class: None,
        }
    }

    /// Copies from a specific version of the source.
    pub fn from_version(mut self, version_id: impl Into<String>) -> Self {
        self.source_version = Some(version_id.into());
        self
    }

    /// Sets the storage class of the copy.
    pub fn with_storage_class(mut self, class: StorageClass) -> Self {
        self.storage_class = Some(class);
        self
    }

    /// Formats the `CopySource` header value for `bucket`.
    ///
    /// Each key segment is percent-encoded; `/` separators are kept.
    pub fn copy_source(&self, bucket: &str) -> String {
        let key = self
            .source_key
            .split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/");
        match &self.source_version {
            Some(version) => format!(
                "{bucket}/{key}?versionId={}",
                urlencoding::encode(version)
            ),
            None => format!("{bucket}/{key}"),
        }
    }
}

/// Storage classes an object can be moved to by `set-storage-class`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Standard,
    StandardIa,
    OnezoneIa,
    Glacier,
    DeepArchive,
}

impl StorageClass {
    /// All accepted classes, in display order.
    pub const ALL: [StorageClass; 5] = [
        Self::Standard,
        Self::StandardIa,
        Self::OnezoneIa,
        Self::Glacier,
        Self::DeepArchive,
    ];

    /// Returns the S3 wire name of the class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::StandardIa => "STANDARD_IA",
            Self::OnezoneIa => "ONEZONE_IA",
            Self::Glacier => "GLACIER",
            Self::DeepArchive => "DEEP_ARCHIVE",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = MedstoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|class| class.as_str() == normalized)
            .ok_or_else(|| {
                let choices: Vec<&str> = Self::ALL.iter().map(|c| c.as_str()).collect();
                MedstoreError::invalid_input(format!(
                    "Unknown storage class '{s}'. Expected one of: {}",
                    choices.join(", ")
                ))
            })
    }
}

/// Trait defining the object storage operations used by medstore.
///
/// Every call goes to the service; implementations keep no cache.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns whether the bucket exists and is reachable.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Creates a bucket in `region`.
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<BucketCreation>;

    /// Deletes an empty bucket.
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Lists all buckets in the account.
    async fn list_buckets(&self) -> Result<Vec<BucketSummary>>;

    /// Turns on object versioning.
    async fn enable_versioning(&self, bucket: &str) -> Result<()>;

    /// Replaces the bucket's lifecycle configuration.
    async fn put_lifecycle(&self, bucket: &str, policy: &LifecyclePolicy) -> Result<()>;

    /// Replaces the bucket's access policy with a JSON document.
    async fn put_bucket_policy(&self, bucket: &str, policy_json: &str) -> Result<()>;

    /// Sets default server-side encryption.
    async fn put_default_encryption(&self, bucket: &str, encryption: DefaultEncryption)
        -> Result<()>;

    /// Lists every current object in the bucket.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>>;

    /// Lists versions and delete markers, optionally restricted to a key prefix.
    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ObjectVersion>>;

    /// Permanently deletes the given versions in one batch request.
    async fn delete_versions(&self, bucket: &str, versions: &[ObjectVersion]) -> Result<()>;

    /// Uploads a local file.
    async fn put_object_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<()>;

    /// Downloads an object's full body.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Fetches object metadata.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead>;

    /// Deletes an object, or one specific version of it.
    async fn delete_object(&self, bucket: &str, key: &str, version_id: Option<&str>)
        -> Result<()>;

    /// Performs a server-side copy inside `bucket`.
    async fn copy_object(&self, bucket: &str, copy: &CopySpec) -> Result<()>;

    /// Issues a presigned GET URL.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String>;
}
