//! Bucket policy documents: lifecycle rules, access policy and encryption.

use serde_json::{json, Value};

/// Storage tiers objects can transition into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionClass {
    IntelligentTiering,
    Glacier,
    DeepArchive,
}

impl TransitionClass {
    /// Returns the S3 wire name of the tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntelligentTiering => "INTELLIGENT_TIERING",
            Self::Glacier => "GLACIER",
            Self::DeepArchive => "DEEP_ARCHIVE",
        }
    }
}

/// Move objects to `class` once they are `days` old.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub days: i32,
    pub class: TransitionClass,
}

impl Transition {
    pub const fn new(days: i32, class: TransitionClass) -> Self {
        Self { days, class }
    }
}

/// A single enabled lifecycle rule applied to every object matching `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    pub id: String,
    pub prefix: String,
    pub transitions: Vec<Transition>,
    /// Transitions counted from the moment a version stops being current.
    pub noncurrent_transitions: Vec<Transition>,
    pub noncurrent_expiration_days: Option<i32>,
    pub abort_multipart_days: Option<i32>,
}

/// Roughly seven years, the retention window for patient records.
const RETENTION_DAYS: i32 = 2555;

impl LifecyclePolicy {
    /// The retention policy applied to every bucket created by setup.
    pub fn healthcare() -> Self {
        Self {
            id: "Healthcare data lifecycle policy".to_string(),
            prefix: String::new(),
            transitions: vec![
                Transition::new(60, TransitionClass::IntelligentTiering),
                Transition::new(365, TransitionClass::Glacier),
                Transition::new(RETENTION_DAYS, TransitionClass::DeepArchive),
            ],
            noncurrent_transitions: vec![
                Transition::new(60, TransitionClass::IntelligentTiering),
                Transition::new(365, TransitionClass::Glacier),
            ],
            noncurrent_expiration_days: Some(RETENTION_DAYS),
            abort_multipart_days: Some(7),
        }
    }
}

/// Default server-side encryption algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultEncryption {
    Aes256,
}

impl DefaultEncryption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256 => "AES256",
        }
    }
}

/// Builds the bucket policy that lets Athena read the bucket.
pub fn athena_access_policy(bucket: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "AllowAthenaAccessToDataBucket",
                "Effect": "Allow",
                "Principal": { "Service": "athena.amazonaws.com" },
                "Action": [
                    "s3:GetBucketLocation",
                    "s3:GetObject",
                    "s3:ListBucket"
                ],
                "Resource": [
                    format!("arn:aws:s3:::{bucket}"),
                    format!("arn:aws:s3:::{bucket}/*")
                ]
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthcare_policy_tiers() {
        let policy = LifecyclePolicy::healthcare();
        let days: Vec<i32> = policy.transitions.iter().map(|t| t.days).collect();
        assert_eq!(days, vec![60, 365, 2555]);
        assert_eq!(
            policy.transitions.last().unwrap().class,
            TransitionClass::DeepArchive
        );
        assert_eq!(policy.noncurrent_transitions.len(), 2);
        assert_eq!(policy.noncurrent_expiration_days, Some(2555));
        assert_eq!(policy.abort_multipart_days, Some(7));
        assert!(policy.prefix.is_empty());
    }

    #[test]
    fn test_athena_access_policy_resources() {
        let policy = athena_access_policy("patient-data-1");
        let statement = &policy["Statement"][0];

        assert_eq!(statement["Principal"]["Service"], "athena.amazonaws.com");
        assert_eq!(statement["Resource"][0], "arn:aws:s3:::patient-data-1");
        assert_eq!(statement["Resource"][1], "arn:aws:s3:::patient-data-1/*");
        assert_eq!(statement["Action"].as_array().unwrap().len(), 3);
    }
}
