//! Command execution for medstore.
//!
//! Handlers receive their clients through a [`CommandContext`] and return a
//! [`CommandOutput`]; they never print. This keeps every command testable
//! against the in-memory store and query service.

pub mod athena;
pub mod output;
pub mod s3;

pub use output::CommandOutput;

use std::path::Path;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use crate::athena::QueryService;
use crate::cli::Command;
use crate::config::{BucketRole, Config};
use crate::error::Result;
use crate::query::PollSettings;
use crate::storage::ObjectStore;

/// Context provided to command handlers.
pub struct CommandContext<'a> {
    /// Object store for bucket and object calls.
    pub store: &'a dyn ObjectStore,
    /// Query service for Athena statements.
    pub queries: &'a dyn QueryService,
    /// Location of the bucket configuration file.
    pub config_path: &'a Path,
    /// Region new buckets are created in.
    pub region: &'a str,
    /// Fired on Ctrl-C.
    pub cancel: &'a CancellationToken,
    /// Poll cadence for Athena statements; the timeout comes from the command.
    pub poll: PollSettings,
    /// Date stamped into downloaded and stored result file names.
    pub today: NaiveDate,
}

impl<'a> CommandContext<'a> {
    /// Loads the bucket configuration file.
    pub fn load_config(&self) -> Result<Config> {
        Config::load_from_file(self.config_path)
    }

    /// Returns `explicit` if given, otherwise the configured bucket for `role`.
    pub fn resolve_bucket(&self, explicit: Option<&str>, role: BucketRole) -> Result<String> {
        match explicit {
            Some(bucket) => Ok(bucket.to_string()),
            None => Ok(self.load_config()?.require(role)?.to_string()),
        }
    }
}

/// Runs a parsed command.
pub async fn execute(ctx: &CommandContext<'_>, command: &Command) -> Result<CommandOutput> {
    match command {
        Command::S3(args) => s3::run(ctx, &args.command).await,
        Command::Athena(args) => athena::run(ctx, args).await,
    }
}
