//! Object level operations: transfer, listing, versions and storage classes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{MedstoreError, Result};
use crate::routing;
use crate::storage::{
    BucketSummary, CopySpec, DefaultEncryption, ObjectStore, ObjectSummary, ObjectVersion,
    StorageClass,
};

/// Default lifetime of a presigned URL.
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);

/// Longest lifetime S3 accepts for a presigned URL.
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// Reported when `HeadObject` omits the storage class.
const IMPLICIT_STORAGE_CLASS: &str = "STANDARD";

/// How `list-buckets` prints bucket names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketListFormat {
    /// One bullet per bucket with its creation date.
    Detailed,
    /// One bullet per bucket.
    NoDate,
    /// All names on one line, space separated.
    Collection,
}

/// Renders a bucket listing.
pub fn format_bucket_list(buckets: &[BucketSummary], format: BucketListFormat) -> String {
    if buckets.is_empty() {
        return "No S3 buckets found in the account.".to_string();
    }

    match format {
        BucketListFormat::Collection => buckets
            .iter()
            .map(|b| b.name.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        BucketListFormat::Detailed | BucketListFormat::NoDate => {
            let mut lines = vec!["Existing S3 buckets:".to_string()];
            for bucket in buckets {
                match (&bucket.created, format) {
                    (Some(created), BucketListFormat::Detailed) => {
                        lines.push(format!("- {} (Created: {})", bucket.name, created));
                    }
                    _ => lines.push(format!("- {}", bucket.name)),
                }
            }
            lines.join("\n")
        }
    }
}

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    pub content_type: &'static str,
}

/// What `restore_version` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The requested version is not in the object's history.
    VersionMissing,
    Restored {
        /// A delete marker hid the object and was removed first.
        removed_delete_marker: bool,
    },
}

/// Builds the local file name for a downloaded object.
pub fn download_file_name(key: &str, date: NaiveDate) -> String {
    let base = key.rsplit('/').next().unwrap_or(key);
    format!("dl_{}_{base}", date.format("%Y%m%d"))
}

/// Object operations against one store.
pub struct ObjectOps<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> ObjectOps<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Uploads a local file. The key defaults to the file's base name.
    pub async fn upload(
        &self,
        path: &Path,
        bucket: &str,
        key: Option<&str>,
    ) -> Result<UploadReceipt> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(MedstoreError::invalid_input(format!(
                "File '{}' does not exist",
                path.display()
            )));
        }

        let key = match key {
            Some(key) => key.to_string(),
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    MedstoreError::invalid_input(format!(
                        "Cannot derive an object key from '{}'",
                        path.display()
                    ))
                })?,
        };
        let content_type = routing::content_type(path);

        self.store
            .put_object_file(bucket, &key, path, content_type)
            .await?;
        info!("Uploaded '{}' to {}/{} as {}", path.display(), bucket, key, content_type);

        Ok(UploadReceipt {
            bucket: bucket.to_string(),
            key,
            content_type,
        })
    }

    /// Downloads an object into `dir` as `dl_<YYYYMMDD>_<name>`.
    pub async fn download(
        &self,
        bucket: &str,
        key: &str,
        dir: &Path,
        date: NaiveDate,
    ) -> Result<PathBuf> {
        let body = self.store.get_object(bucket, key).await?;

        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            MedstoreError::io(format!("Cannot create '{}': {e}", dir.display()))
        })?;
        let target = dir.join(download_file_name(key, date));
        tokio::fs::write(&target, &body)
            .await
            .map_err(|e| MedstoreError::io(format!("Cannot write '{}': {e}", target.display())))?;

        debug!("Wrote {} bytes to {}", body.len(), target.display());
        Ok(target)
    }

    pub async fn list_contents(&self, bucket: &str) -> Result<Vec<ObjectSummary>> {
        self.store.list_objects(bucket).await
    }

    pub async fn list_buckets(&self) -> Result<Vec<BucketSummary>> {
        self.store.list_buckets().await
    }

    /// Lists the versions and delete markers of exactly `key`.
    pub async fn list_versions(&self, bucket: &str, key: &str) -> Result<Vec<ObjectVersion>> {
        let versions = self.store.list_object_versions(bucket, Some(key)).await?;
        Ok(versions.into_iter().filter(|v| v.key == key).collect())
    }

    /// Makes an earlier version current again.
    ///
    /// If the object is hidden by a delete marker, the marker is removed
    /// before the version is copied onto the key.
    pub async fn restore_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> Result<RestoreOutcome> {
        let versions = self.list_versions(bucket, key).await?;

        let exists = versions
            .iter()
            .any(|v| !v.is_delete_marker && v.version_id == version_id);
        if !exists {
            return Ok(RestoreOutcome::VersionMissing);
        }

        let marker = versions
            .iter()
            .find(|v| v.is_delete_marker && v.is_latest)
            .map(|v| v.version_id.clone());
        if let Some(marker) = &marker {
            self.store.delete_object(bucket, key, Some(marker)).await?;
            info!("Removed delete marker {} for {}", marker, key);
        }

        let copy = CopySpec::new(key, key).from_version(version_id);
        self.store.copy_object(bucket, &copy).await?;

        Ok(RestoreOutcome::Restored {
            removed_delete_marker: marker.is_some(),
        })
    }

    /// Deletes an object. On a versioned bucket this leaves a delete marker.
    pub async fn delete_file(&self, bucket: &str, key: &str) -> Result<()> {
        self.store.delete_object(bucket, key, None).await
    }

    /// Rewrites an object in place with a new storage class.
    pub async fn set_storage_class(
        &self,
        bucket: &str,
        key: &str,
        class: StorageClass,
    ) -> Result<()> {
        let copy = CopySpec::new(key, key).with_storage_class(class);
        self.store.copy_object(bucket, &copy).await
    }

    /// Returns an object's storage class name.
    pub async fn storage_class(&self, bucket: &str, key: &str) -> Result<String> {
        let head = self.store.head_object(bucket, key).await?;
        Ok(head
            .storage_class
            .unwrap_or_else(|| IMPLICIT_STORAGE_CLASS.to_string()))
    }

    /// Returns an object's body as text, replacing invalid UTF-8.
    pub async fn read_object(&self, bucket: &str, key: &str) -> Result<String> {
        let body = self.store.get_object(bucket, key).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Issues a presigned GET URL valid for `expires_in`.
    pub async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String> {
        if expires_in < Duration::from_secs(1) || expires_in > MAX_PRESIGN_EXPIRY {
            return Err(MedstoreError::invalid_input(format!(
                "Expiration must be between 1 and {} seconds",
                MAX_PRESIGN_EXPIRY.as_secs()
            )));
        }
        self.store.presign_get(bucket, key, expires_in).await
    }

    /// Turns on default AES-256 encryption.
    pub async fn enable_encryption(&self, bucket: &str) -> Result<()> {
        self.store
            .put_default_encryption(bucket, DefaultEncryption::Aes256)
            .await
    }
}
