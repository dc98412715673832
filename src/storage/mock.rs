//! In-memory object store for testing.
//!
//! Models just enough of S3 for the command layer: buckets with optional
//! versioning, object versions with delete markers, and the policy documents
//! attached by provisioning. Individual operations can be made to fail.

use super::{
    BucketCreation, BucketSummary, CopySpec, DefaultEncryption, LifecyclePolicy, ObjectHead,
    ObjectStore, ObjectSummary, ObjectVersion,
};
use crate::error::{MedstoreError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Largest batch accepted by `delete_versions`, as enforced by S3.
pub const MAX_DELETE_BATCH: usize = 1000;

const CREATED_AT: &str = "2024-10-12T09:30:00Z";

#[derive(Debug, Clone)]
struct StoredVersion {
    key: String,
    version_id: String,
    body: Vec<u8>,
    content_type: Option<String>,
    storage_class: Option<String>,
    is_delete_marker: bool,
    sequence: u64,
}

#[derive(Debug, Default)]
struct MockBucket {
    region: String,
    versioning: bool,
    lifecycle: Option<LifecyclePolicy>,
    policy: Option<String>,
    encryption: Option<DefaultEncryption>,
    /// Every version ever written, oldest first.
    versions: Vec<StoredVersion>,
}

impl MockBucket {
    fn latest(&self, key: &str) -> Option<&StoredVersion> {
        self.versions.iter().rev().find(|v| v.key == key)
    }

    fn current(&self, key: &str) -> Option<&StoredVersion> {
        self.latest(key).filter(|v| !v.is_delete_marker)
    }
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, MockBucket>,
    failing: HashSet<&'static str>,
    next_sequence: u64,
    copies: Vec<CopySpec>,
    delete_batches: Vec<usize>,
}

impl State {
    fn bucket(&self, name: &str) -> Result<&MockBucket> {
        self.buckets
            .get(name)
            .ok_or_else(|| no_such_bucket(name))
    }

    fn bucket_mut(&mut self, name: &str) -> Result<&mut MockBucket> {
        self.buckets
            .get_mut(name)
            .ok_or_else(|| no_such_bucket(name))
    }

    fn write_version(
        &mut self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<String>,
        storage_class: Option<String>,
        is_delete_marker: bool,
    ) -> Result<()> {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        let target = self.bucket_mut(bucket)?;

        let version_id = if target.versioning {
            format!("v{sequence}")
        } else {
            target.versions.retain(|v| v.key != key);
            "null".to_string()
        };

        if is_delete_marker && !target.versioning {
            return Ok(());
        }

        target.versions.push(StoredVersion {
            key: key.to_string(),
            version_id,
            body,
            content_type,
            storage_class,
            is_delete_marker,
            sequence,
        });
        Ok(())
    }
}

fn no_such_bucket(name: &str) -> MedstoreError {
    MedstoreError::NotFound(format!("NoSuchBucket: the bucket '{name}' does not exist"))
}

fn no_such_key(bucket: &str, key: &str) -> MedstoreError {
    MedstoreError::NotFound(format!("NoSuchKey: '{key}' does not exist in '{bucket}'"))
}

/// In-memory [`ObjectStore`].
#[derive(Debug, Default)]
pub struct MockObjectStore {
    state: Mutex<State>,
}

impl MockObjectStore {
    /// Creates an empty store with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds the given buckets.
    pub fn with_buckets(names: &[&str]) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            for name in names {
                state.buckets.insert(
                    (*name).to_string(),
                    MockBucket {
                        region: crate::storage::LEGACY_REGION.to_string(),
                        ..Default::default()
                    },
                );
            }
        }
        store
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| MedstoreError::internal("mock object store lock poisoned"))
    }

    fn check(&self, operation: &'static str) -> Result<MutexGuard<'_, State>> {
        let state = self.state()?;
        if state.failing.contains(operation) {
            return Err(MedstoreError::Service(format!(
                "{operation}: InternalError: injected failure"
            )));
        }
        Ok(state)
    }

    /// Makes every subsequent call of `operation` (e.g. `"put_lifecycle"`) fail.
    pub fn fail_on(&self, operation: &'static str) {
        if let Ok(mut state) = self.state.lock() {
            state.failing.insert(operation);
        }
    }

    /// Stores an object directly, bypassing the failure switches.
    pub fn insert_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<()> {
        self.state()?
            .write_version(bucket, key, body.to_vec(), None, None, false)
    }

    /// Returns the current body of an object.
    pub fn object_body(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().ok()?;
        state.buckets.get(bucket)?.current(key).map(|v| v.body.clone())
    }

    /// Returns the current content type of an object.
    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        let state = self.state.lock().ok()?;
        state.buckets.get(bucket)?.current(key)?.content_type.clone()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state
            .lock()
            .map(|s| s.buckets.contains_key(bucket))
            .unwrap_or(false)
    }

    pub fn bucket_region(&self, bucket: &str) -> Option<String> {
        let state = self.state.lock().ok()?;
        state.buckets.get(bucket).map(|b| b.region.clone())
    }

    pub fn bucket_count(&self) -> usize {
        self.state.lock().map(|s| s.buckets.len()).unwrap_or(0)
    }

    pub fn versioning_enabled(&self, bucket: &str) -> bool {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.buckets.get(bucket).map(|b| b.versioning))
            .unwrap_or(false)
    }

    pub fn lifecycle(&self, bucket: &str) -> Option<LifecyclePolicy> {
        let state = self.state.lock().ok()?;
        state.buckets.get(bucket)?.lifecycle.clone()
    }

    pub fn bucket_policy(&self, bucket: &str) -> Option<String> {
        let state = self.state.lock().ok()?;
        state.buckets.get(bucket)?.policy.clone()
    }

    pub fn encryption(&self, bucket: &str) -> Option<DefaultEncryption> {
        let state = self.state.lock().ok()?;
        state.buckets.get(bucket)?.encryption
    }

    /// Every copy performed so far, in call order.
    pub fn copies(&self) -> Vec<CopySpec> {
        self.state
            .lock()
            .map(|s| s.copies.clone())
            .unwrap_or_default()
    }

    /// Sizes of the `delete_versions` batches received so far.
    pub fn delete_batches(&self) -> Vec<usize> {
        self.state
            .lock()
            .map(|s| s.delete_batches.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let state = self.check("bucket_exists")?;
        Ok(state.buckets.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<BucketCreation> {
        let mut state = self.check("create_bucket")?;
        if state.buckets.contains_key(bucket) {
            return Ok(BucketCreation::AlreadyOwned);
        }
        state.buckets.insert(
            bucket.to_string(),
            MockBucket {
                region: region.to_string(),
                ..Default::default()
            },
        );
        Ok(BucketCreation::Created)
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.check("delete_bucket")?;
        if !state.bucket(bucket)?.versions.is_empty() {
            return Err(MedstoreError::Service(format!(
                "DeleteBucket {bucket}: BucketNotEmpty: the bucket you tried to delete is not empty"
            )));
        }
        state.buckets.remove(bucket);
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketSummary>> {
        let state = self.check("list_buckets")?;
        Ok(state
            .buckets
            .keys()
            .map(|name| BucketSummary {
                name: name.clone(),
                created: Some(CREATED_AT.to_string()),
            })
            .collect())
    }

    async fn enable_versioning(&self, bucket: &str) -> Result<()> {
        let mut state = self.check("enable_versioning")?;
        state.bucket_mut(bucket)?.versioning = true;
        Ok(())
    }

    async fn put_lifecycle(&self, bucket: &str, policy: &LifecyclePolicy) -> Result<()> {
        let mut state = self.check("put_lifecycle")?;
        state.bucket_mut(bucket)?.lifecycle = Some(policy.clone());
        Ok(())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy_json: &str) -> Result<()> {
        let mut state = self.check("put_bucket_policy")?;
        serde_json::from_str::<serde_json::Value>(policy_json).map_err(|e| {
            MedstoreError::InvalidRequest(format!("PutBucketPolicy {bucket}: MalformedPolicy: {e}"))
        })?;
        state.bucket_mut(bucket)?.policy = Some(policy_json.to_string());
        Ok(())
    }

    async fn put_default_encryption(
        &self,
        bucket: &str,
        encryption: DefaultEncryption,
    ) -> Result<()> {
        let mut state = self.check("put_default_encryption")?;
        state.bucket_mut(bucket)?.encryption = Some(encryption);
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>> {
        let state = self.check("list_objects")?;
        let target = state.bucket(bucket)?;

        let keys: BTreeMap<&str, i64> = target
            .versions
            .iter()
            .filter_map(|v| {
                target
                    .current(&v.key)
                    .map(|current| (current.key.as_str(), current.body.len() as i64))
            })
            .collect();

        Ok(keys
            .into_iter()
            .map(|(key, size)| ObjectSummary {
                key: key.to_string(),
                size,
            })
            .collect())
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ObjectVersion>> {
        let state = self.check("list_object_versions")?;
        let target = state.bucket(bucket)?;

        let mut entries: Vec<&StoredVersion> = target
            .versions
            .iter()
            .filter(|v| prefix.map_or(true, |p| v.key.starts_with(p)))
            .collect();
        // By key, newest first within a key.
        entries.sort_by(|a, b| a.key.cmp(&b.key).then(b.sequence.cmp(&a.sequence)));

        Ok(entries
            .into_iter()
            .map(|v| ObjectVersion {
                key: v.key.clone(),
                version_id: v.version_id.clone(),
                is_latest: target
                    .latest(&v.key)
                    .is_some_and(|l| l.sequence == v.sequence),
                is_delete_marker: v.is_delete_marker,
                last_modified: Some(CREATED_AT.to_string()),
            })
            .collect())
    }

    async fn delete_versions(&self, bucket: &str, versions: &[ObjectVersion]) -> Result<()> {
        let mut state = self.check("delete_versions")?;
        if versions.len() > MAX_DELETE_BATCH {
            return Err(MedstoreError::InvalidRequest(format!(
                "DeleteObjects {bucket}: MalformedXML: {} keys exceeds the limit of {MAX_DELETE_BATCH}",
                versions.len()
            )));
        }
        state.delete_batches.push(versions.len());

        let target = state.bucket_mut(bucket)?;
        target.versions.retain(|stored| {
            !versions
                .iter()
                .any(|v| v.key == stored.key && v.version_id == stored.version_id)
        });
        Ok(())
    }

    async fn put_object_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<()> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|e| MedstoreError::io(format!("Cannot read '{}': {e}", path.display())))?;

        let mut state = self.check("put_object_file")?;
        state.write_version(
            bucket,
            key,
            body,
            Some(content_type.to_string()),
            None,
            false,
        )
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let state = self.check("get_object")?;
        state
            .bucket(bucket)?
            .current(key)
            .map(|v| v.body.clone())
            .ok_or_else(|| no_such_key(bucket, key))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let state = self.check("head_object")?;
        let version = state
            .bucket(bucket)?
            .current(key)
            .ok_or_else(|| no_such_key(bucket, key))?;

        Ok(ObjectHead {
            size: version.body.len() as i64,
            content_type: version.content_type.clone(),
            storage_class: version.storage_class.clone(),
        })
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<()> {
        let mut state = self.check("delete_object")?;

        match version_id {
            Some(id) => {
                let target = state.bucket_mut(bucket)?;
                let before = target.versions.len();
                target
                    .versions
                    .retain(|v| !(v.key == key && v.version_id == id));
                if target.versions.len() == before {
                    return Err(MedstoreError::InvalidRequest(format!(
                        "DeleteObject {bucket}/{key}: InvalidArgument: invalid version id '{id}'"
                    )));
                }
                Ok(())
            }
            None => state.write_version(bucket, key, Vec::new(), None, None, true),
        }
    }

    async fn copy_object(&self, bucket: &str, copy: &CopySpec) -> Result<()> {
        let mut state = self.check("copy_object")?;
        let target = state.bucket(bucket)?;

        let source = match &copy.source_version {
            Some(id) => target
                .versions
                .iter()
                .find(|v| v.key == copy.source_key && &v.version_id == id)
                .filter(|v| !v.is_delete_marker),
            None => target.current(&copy.source_key),
        }
        .cloned()
        .ok_or_else(|| no_such_key(bucket, &copy.source_key))?;

        state.copies.push(copy.clone());
        state.write_version(
            bucket,
            &copy.destination_key,
            source.body,
            source.content_type,
            copy.storage_class.map(|c| c.as_str().to_string()),
            false,
        )
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        let _state = self.check("presign_get")?;
        Ok(format!(
            "https://{bucket}.s3.amazonaws.com/{key}?X-Amz-Expires={}&X-Amz-Signature=mock",
            expires_in.as_secs()
        ))
    }
}
