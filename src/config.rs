//! Configuration management for medstore.
//!
//! The configuration is a flat JSON object naming the bucket used for each
//! role. It is written once by `s3 setup` and read by every command that
//! needs a bucket name.

use crate::error::{MedstoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Region used when neither `--region` nor `AWS_REGION` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Logical bucket roles stored in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketRole {
    /// Medical images (anything with an `image/*` content type).
    Images,
    /// Patient data files and everything not routed elsewhere.
    Data,
    /// Athena query output location.
    QueryOutput,
}

impl BucketRole {
    /// All roles, in the order they are provisioned by setup.
    pub const ALL: [BucketRole; 3] = [Self::Images, Self::Data, Self::QueryOutput];

    /// Returns the JSON key used for this role.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Images => "images_bucket",
            Self::Data => "data_bucket",
            Self::QueryOutput => "athena_output_bucket",
        }
    }
}

impl fmt::Display for BucketRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Bucket names by role, as persisted in `config.json`.
///
/// A role whose bucket was deleted is kept as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub images_bucket: Option<String>,

    #[serde(default)]
    pub data_bucket: Option<String>,

    #[serde(default)]
    pub athena_output_bucket: Option<String>,
}

impl Config {
    /// Returns the default config file path (`./config.json`).
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Creates a configuration with all three roles assigned.
    pub fn with_buckets(
        images: impl Into<String>,
        data: impl Into<String>,
        query_output: impl Into<String>,
    ) -> Self {
        Self {
            images_bucket: Some(images.into()),
            data_bucket: Some(data.into()),
            athena_output_bucket: Some(query_output.into()),
        }
    }

    /// Loads configuration from a JSON file.
    ///
    /// Unlike optional settings files, a missing file is an error: every
    /// command that reads it needs bucket names produced by setup.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MedstoreError::config(format!(
                "Configuration file '{}' not found. Please run the setup command first.",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            MedstoreError::config(format!("Failed to read '{}': {e}", path.display()))
        })?;

        Self::parse_json(&content, path)
    }

    /// Parses configuration from a JSON string.
    fn parse_json(content: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            MedstoreError::config(format!("Error parsing '{}': {e}", path.display()))
        })
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MedstoreError::internal(format!("Failed to encode config: {e}")))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MedstoreError::config(format!("Error saving configuration: {e}"))
                })?;
            }
        }

        std::fs::write(path, json)
            .map_err(|e| MedstoreError::config(format!("Error saving configuration: {e}")))
    }

    /// Returns the bucket assigned to a role, if any.
    pub fn bucket(&self, role: BucketRole) -> Option<&str> {
        match role {
            BucketRole::Images => self.images_bucket.as_deref(),
            BucketRole::Data => self.data_bucket.as_deref(),
            BucketRole::QueryOutput => self.athena_output_bucket.as_deref(),
        }
    }

    /// Returns the bucket assigned to a role, failing if it is missing or cleared.
    pub fn require(&self, role: BucketRole) -> Result<&str> {
        self.bucket(role).ok_or_else(|| {
            MedstoreError::config(format!(
                "No bucket configured for '{}'. Please run the setup command first.",
                role.key()
            ))
        })
    }

    /// Clears every role pointing at `bucket`. Returns true if anything changed.
    pub fn clear_bucket(&mut self, bucket: &str) -> bool {
        let mut changed = false;
        for slot in [
            &mut self.images_bucket,
            &mut self.data_bucket,
            &mut self.athena_output_bucket,
        ] {
            if slot.as_deref() == Some(bucket) {
                *slot = None;
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_parse_valid_config() {
        let json = r#"{
            "images_bucket": "medical-images-1",
            "data_bucket": "patient-data-1",
            "athena_output_bucket": "athena-query-results-1"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.require(BucketRole::Images).unwrap(), "medical-images-1");
        assert_eq!(config.require(BucketRole::Data).unwrap(), "patient-data-1");
        assert_eq!(
            config.require(BucketRole::QueryOutput).unwrap(),
            "athena-query-results-1"
        );
    }

    #[test]
    fn test_missing_key_fails_on_require() {
        let json = r#"{ "data_bucket": "patient-data-1" }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        let err = config.require(BucketRole::QueryOutput).unwrap_err();
        assert_eq!(err.category(), "Configuration Error");
        assert!(err.to_string().contains("athena_output_bucket"));
    }

    #[test]
    fn test_null_role_fails_on_require() {
        let json = r#"{ "images_bucket": null, "data_bucket": "d", "athena_output_bucket": "o" }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert!(config.require(BucketRole::Images).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = Config::load_from_file(&dir.path().join("config.json")).unwrap_err();
        assert!(err.to_string().contains("Please run the setup command first"));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Error parsing"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config::with_buckets("img", "data", "out");

        config.save_to_file(&path).unwrap();
        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"athena_output_bucket\": \"out\""));
    }

    #[test]
    fn test_clear_bucket() {
        let mut config = Config::with_buckets("img", "data", "out");
        assert!(config.clear_bucket("data"));
        assert_eq!(config.data_bucket, None);
        assert_eq!(config.images_bucket.as_deref(), Some("img"));
        assert!(!config.clear_bucket("unrelated"));
    }

    #[test]
    fn test_cleared_role_serializes_as_null() {
        let mut config = Config::with_buckets("img", "data", "out");
        config.clear_bucket("img");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"images_bucket\":null"));
    }

    #[test]
    fn test_role_keys() {
        assert_eq!(BucketRole::Images.key(), "images_bucket");
        assert_eq!(BucketRole::Data.to_string(), "data_bucket");
        assert_eq!(BucketRole::QueryOutput.key(), "athena_output_bucket");
    }
}
