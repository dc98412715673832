//! Command-line argument parsing for medstore.

use crate::config::{Config, DEFAULT_REGION};
use crate::query::runner::DEFAULT_QUERY_TIMEOUT;
use crate::storage::StorageClass;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Manage S3 buckets and Athena tables for healthcare data.
#[derive(Parser, Debug)]
#[command(name = "medstore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, value_name = "PATH", env = "MEDSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to the log file instead of stderr
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bucket and object operations
    S3(S3Args),
    /// Athena database and query operations
    Athena(AthenaArgs),
}

#[derive(Args, Debug)]
pub struct S3Args {
    #[command(subcommand)]
    pub command: S3Command,
}

#[derive(Subcommand, Debug)]
pub enum S3Command {
    /// Create and configure the images, data and query result buckets
    Setup,
    /// Delete buckets with all of their object versions
    DeleteBucket {
        #[arg(required = true, value_name = "NAMES")]
        names: Vec<String>,
    },
    /// List buckets in the account
    ListBuckets {
        /// Omit creation dates
        #[arg(long)]
        nodate: bool,
        /// Print names on one line, space separated
        #[arg(long)]
        collection: bool,
    },
    /// List objects in a bucket
    ListContents { bucket: String },
    /// Upload a file, routed by type unless a bucket is given
    Upload {
        file: PathBuf,
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Download an object as dl_<date>_<name>
    Download {
        file: String,
        #[arg(long)]
        bucket: Option<String>,
        /// Directory to write into
        #[arg(long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,
    },
    /// Delete an object from the data bucket
    DeleteFile { file: String },
    /// List versions and delete markers of an object in the data bucket
    ListVersions { file: String },
    /// Make an earlier version of an object current again
    RestoreVersion { file: String, version_id: String },
    /// Change the storage class of an object in the data bucket
    SetStorageClass {
        file: String,
        /// STANDARD, STANDARD_IA, ONEZONE_IA, GLACIER or DEEP_ARCHIVE
        storage_class: StorageClass,
    },
    /// Show the storage class of an object
    StorageClass {
        file: String,
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Print an object's contents
    Read {
        file: String,
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Generate a presigned download URL
    PresignedUrl {
        file: String,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        expiration: u64,
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Enable default AES-256 encryption on a bucket
    EnableEncryption {
        #[arg(long)]
        bucket: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct AthenaArgs {
    /// Athena database
    #[arg(long, global = true, default_value = "medical_db")]
    pub database: String,

    /// Patient data table
    #[arg(long, global = true, default_value = "patient_data")]
    pub table: String,

    /// Seconds to wait for a query, 0 to wait indefinitely
    #[arg(long, global = true, default_value_t = DEFAULT_QUERY_TIMEOUT.as_secs())]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: AthenaCommand,
}

#[derive(Subcommand, Debug)]
pub enum AthenaCommand {
    /// Create the database and (re)create the patient table
    Setup,
    /// Describe the patient table
    Describe,
    /// Run a SQL statement
    RunQuery { sql: String },
    /// Run a SELECT repeatedly and report average latency and scan size
    PerformanceTest {
        sql: String,
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
        iterations: u32,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }
}
