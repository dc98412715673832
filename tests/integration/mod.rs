//! Shared fixtures for command tests.

pub mod athena_commands_test;
pub mod s3_commands_test;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use medstore::athena::MockQueryService;
use medstore::cli::Command;
use medstore::commands::{self, CommandContext, CommandOutput};
use medstore::config::Config;
use medstore::error::Result;
use medstore::query::PollSettings;
use medstore::storage::MockObjectStore;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const IMAGES: &str = "medical-images-test";
pub const DATA: &str = "patient-data-test";
pub const RESULTS: &str = "athena-query-results-test";

/// A scratch directory holding the config file.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Creates a workspace whose config names the three test buckets.
    pub fn configured() -> Self {
        let workspace = Self::new();
        Config::with_buckets(IMAGES, DATA, RESULTS)
            .save_to_file(&workspace.config_path())
            .unwrap();
        workspace
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.json")
    }

    pub fn config(&self) -> Config {
        Config::load_from_file(&self.config_path()).unwrap()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 12).unwrap()
}

pub fn store_with_buckets() -> MockObjectStore {
    MockObjectStore::with_buckets(&[IMAGES, DATA, RESULTS])
}

/// Parses `args` as a medstore command line.
pub fn parse(args: &[&str]) -> Command {
    use clap::Parser;
    let mut argv = vec!["medstore"];
    argv.extend_from_slice(args);
    medstore::cli::Cli::parse_from(argv).command
}

/// Runs a command line against the given fakes.
pub async fn run(
    workspace: &Workspace,
    store: &MockObjectStore,
    queries: &MockQueryService,
    args: &[&str],
) -> Result<CommandOutput> {
    let config_path = workspace.config_path();
    let cancel = CancellationToken::new();
    let ctx = CommandContext {
        store,
        queries,
        config_path: &config_path,
        region: "eu-west-1",
        cancel: &cancel,
        poll: PollSettings {
            interval: Duration::from_millis(1),
            timeout: None,
        },
        today: today(),
    };
    commands::execute(&ctx, &parse(args)).await
}

/// Renders every leaf of an output as text, one entry per leaf.
pub fn lines(output: &CommandOutput) -> Vec<String> {
    output.flatten().iter().map(|o| o.to_string()).collect()
}
