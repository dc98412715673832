//! S3 implementation of [`ObjectStore`] using the AWS SDK.

use super::{
    BucketCreation, BucketSummary, CopySpec, DefaultEncryption, LifecyclePolicy, ObjectHead,
    ObjectStore, ObjectSummary, ObjectVersion, Transition, TransitionClass, LEGACY_REGION,
};
use crate::aws::classify_sdk_error;
use crate::error::{MedstoreError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::BuildError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime, DateTimeFormat};
use aws_sdk_s3::types as s3t;
use aws_sdk_s3::Client as S3Client;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// S3-backed object store.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// Wraps an existing S3 client.
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Creates a client from a loaded SDK configuration.
    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(S3Client::new(config))
    }
}

fn build_error(what: &str, err: BuildError) -> MedstoreError {
    MedstoreError::internal(format!("Failed to build {what}: {err}"))
}

fn format_time(time: Option<&DateTime>) -> Option<String> {
    time.and_then(|t| t.fmt(DateTimeFormat::DateTime).ok())
}

fn transition_class(class: TransitionClass) -> s3t::TransitionStorageClass {
    match class {
        TransitionClass::IntelligentTiering => s3t::TransitionStorageClass::IntelligentTiering,
        TransitionClass::Glacier => s3t::TransitionStorageClass::Glacier,
        TransitionClass::DeepArchive => s3t::TransitionStorageClass::DeepArchive,
    }
}

fn lifecycle_configuration(policy: &LifecyclePolicy) -> Result<s3t::BucketLifecycleConfiguration> {
    let transitions = policy
        .transitions
        .iter()
        .map(|t: &Transition| {
            s3t::Transition::builder()
                .days(t.days)
                .storage_class(transition_class(t.class))
                .build()
        })
        .collect::<Vec<_>>();

    let noncurrent = policy
        .noncurrent_transitions
        .iter()
        .map(|t| {
            s3t::NoncurrentVersionTransition::builder()
                .noncurrent_days(t.days)
                .storage_class(transition_class(t.class))
                .build()
        })
        .collect::<Vec<_>>();

    let mut rule = s3t::LifecycleRule::builder()
        .id(&policy.id)
        .status(s3t::ExpirationStatus::Enabled)
        .filter(s3t::LifecycleRuleFilter::builder().prefix(&policy.prefix).build())
        .set_transitions(Some(transitions))
        .set_noncurrent_version_transitions(Some(noncurrent));

    if let Some(days) = policy.noncurrent_expiration_days {
        rule = rule.noncurrent_version_expiration(
            s3t::NoncurrentVersionExpiration::builder()
                .noncurrent_days(days)
                .build(),
        );
    }
    if let Some(days) = policy.abort_multipart_days {
        rule = rule.abort_incomplete_multipart_upload(
            s3t::AbortIncompleteMultipartUpload::builder()
                .days_after_initiation(days)
                .build(),
        );
    }

    let rule = rule.build().map_err(|e| build_error("lifecycle rule", e))?;
    s3t::BucketLifecycleConfiguration::builder()
        .rules(rule)
        .build()
        .map_err(|e| build_error("lifecycle configuration", e))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .is_some_and(|e| e.is_not_found())
                    || err.raw_response().map(|r| r.status().as_u16()) == Some(404);
                if not_found {
                    Ok(false)
                } else {
                    Err(classify_sdk_error(&format!("HeadBucket {bucket}"), err))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<BucketCreation> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if region != LEGACY_REGION {
            request = request.create_bucket_configuration(
                s3t::CreateBucketConfiguration::builder()
                    .location_constraint(s3t::BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(BucketCreation::Created),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you()) =>
            {
                debug!("Bucket {} already owned by caller", bucket);
                Ok(BucketCreation::AlreadyOwned)
            }
            Err(err) => Err(classify_sdk_error(&format!("CreateBucket {bucket}"), err)),
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("DeleteBucket {bucket}"), e))?;
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketSummary>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify_sdk_error("ListBuckets", e))?;

        Ok(output
            .buckets()
            .iter()
            .map(|b| BucketSummary {
                name: b.name().unwrap_or_default().to_string(),
                created: format_time(b.creation_date()),
            })
            .collect())
    }

    async fn enable_versioning(&self, bucket: &str) -> Result<()> {
        let config = s3t::VersioningConfiguration::builder()
            .status(s3t::BucketVersioningStatus::Enabled)
            .build();

        self.client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(config)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("PutBucketVersioning {bucket}"), e))?;
        Ok(())
    }

    async fn put_lifecycle(&self, bucket: &str, policy: &LifecyclePolicy) -> Result<()> {
        let config = lifecycle_configuration(policy)?;

        self.client
            .put_bucket_lifecycle_configuration()
            .bucket(bucket)
            .lifecycle_configuration(config)
            .send()
            .await
            .map_err(|e| {
                classify_sdk_error(&format!("PutBucketLifecycleConfiguration {bucket}"), e)
            })?;
        Ok(())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy_json: &str) -> Result<()> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy_json)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("PutBucketPolicy {bucket}"), e))?;
        Ok(())
    }

    async fn put_default_encryption(
        &self,
        bucket: &str,
        encryption: DefaultEncryption,
    ) -> Result<()> {
        let algorithm = match encryption {
            DefaultEncryption::Aes256 => s3t::ServerSideEncryption::Aes256,
        };
        let default = s3t::ServerSideEncryptionByDefault::builder()
            .sse_algorithm(algorithm)
            .build()
            .map_err(|e| build_error("encryption default", e))?;
        let rule = s3t::ServerSideEncryptionRule::builder()
            .apply_server_side_encryption_by_default(default)
            .build();
        let config = s3t::ServerSideEncryptionConfiguration::builder()
            .rules(rule)
            .build()
            .map_err(|e| build_error("encryption configuration", e))?;

        self.client
            .put_bucket_encryption()
            .bucket(bucket)
            .server_side_encryption_configuration(config)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("PutBucketEncryption {bucket}"), e))?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&format!("ListObjectsV2 {bucket}"), e))?;

            objects.extend(output.contents().iter().map(|o| ObjectSummary {
                key: o.key().unwrap_or_default().to_string(),
                size: o.size().unwrap_or_default(),
            }));

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<ObjectVersion>> {
        let mut entries = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_prefix(prefix.map(str::to_string))
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_marker.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&format!("ListObjectVersions {bucket}"), e))?;

            entries.extend(output.versions().iter().map(|v| ObjectVersion {
                key: v.key().unwrap_or_default().to_string(),
                version_id: v.version_id().unwrap_or("null").to_string(),
                is_latest: v.is_latest().unwrap_or(false),
                is_delete_marker: false,
                last_modified: format_time(v.last_modified()),
            }));
            entries.extend(output.delete_markers().iter().map(|m| ObjectVersion {
                key: m.key().unwrap_or_default().to_string(),
                version_id: m.version_id().unwrap_or("null").to_string(),
                is_latest: m.is_latest().unwrap_or(false),
                is_delete_marker: true,
                last_modified: format_time(m.last_modified()),
            }));

            if !output.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = output.next_key_marker().map(str::to_string);
            version_marker = output.next_version_id_marker().map(str::to_string);
            if key_marker.is_none() && version_marker.is_none() {
                break;
            }
        }

        Ok(entries)
    }

    async fn delete_versions(&self, bucket: &str, versions: &[ObjectVersion]) -> Result<()> {
        if versions.is_empty() {
            return Ok(());
        }

        let identifiers = versions
            .iter()
            .map(|v| {
                s3t::ObjectIdentifier::builder()
                    .key(&v.key)
                    .version_id(&v.version_id)
                    .build()
                    .map_err(|e| build_error("object identifier", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let delete = s3t::Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(|e| build_error("delete request", e))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("DeleteObjects {bucket}"), e))?;

        if let Some(first) = output.errors().first() {
            return Err(MedstoreError::Service(format!(
                "DeleteObjects {bucket}: {} of {} versions failed, first: {} ({})",
                output.errors().len(),
                versions.len(),
                first.key().unwrap_or_default(),
                first.message().or(first.code()).unwrap_or("unknown error"),
            )));
        }
        Ok(())
    }

    async fn put_object_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| MedstoreError::io(format!("Cannot read '{}': {e}", path.display())))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("PutObject {bucket}/{key}"), e))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("GetObject {bucket}/{key}"), e))?;

        let data = output.body.collect().await.map_err(|e| {
            MedstoreError::Transport(format!("GetObject {bucket}/{key}: reading body: {e}"))
        })?;
        Ok(data.into_bytes().to_vec())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("HeadObject {bucket}/{key}"), e))?;

        Ok(ObjectHead {
            size: output.content_length().unwrap_or_default(),
            content_type: output.content_type().map(str::to_string),
            storage_class: output.storage_class().map(|c| c.as_str().to_string()),
        })
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("DeleteObject {bucket}/{key}"), e))?;
        Ok(())
    }

    async fn copy_object(&self, bucket: &str, copy: &CopySpec) -> Result<()> {
        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(copy.copy_source(bucket))
            .key(&copy.destination_key)
            .set_storage_class(
                copy.storage_class
                    .map(|c| s3t::StorageClass::from(c.as_str())),
            )
            .send()
            .await
            .map_err(|e| {
                classify_sdk_error(
                    &format!("CopyObject {} -> {bucket}/{}", copy.copy_source(bucket), copy.destination_key),
                    e,
                )
            })?;
        Ok(())
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| MedstoreError::invalid_input(format!("Invalid expiration: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| classify_sdk_error(&format!("Presign GetObject {bucket}/{key}"), e))?;

        Ok(request.uri().to_string())
    }
}
