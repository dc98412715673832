//! medstore - S3 buckets and Athena queries for healthcare data.

use chrono::Local;
use medstore::athena::AthenaQueryService;
use medstore::aws::load_sdk_config;
use medstore::cli::Cli;
use medstore::commands::{self, CommandContext, CommandOutput};
use medstore::error::Result;
use medstore::logging;
use medstore::query::PollSettings;
use medstore::storage::S3ObjectStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging(cli.verbose);
    } else {
        logging::init_stderr_logging(cli.verbose);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(&cli, &cancel).await {
        Ok(output) => {
            print_output(&output);
            if output.has_errors() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli, cancel: &CancellationToken) -> Result<CommandOutput> {
    let config_path = cli.config_path();
    info!("Using config file: {}", config_path.display());

    let sdk_config = load_sdk_config(&cli.region).await;
    let store = S3ObjectStore::from_config(&sdk_config);
    let queries = AthenaQueryService::from_config(&sdk_config);

    let ctx = CommandContext {
        store: &store,
        queries: &queries,
        config_path: &config_path,
        region: &cli.region,
        cancel,
        poll: PollSettings::default(),
        today: Local::now().date_naive(),
    };

    commands::execute(&ctx, &cli.command).await
}

/// Prints informational parts to stdout and errors to stderr, in order.
fn print_output(output: &CommandOutput) {
    for part in output.flatten() {
        match part {
            CommandOutput::Error(msg) => eprintln!("{msg}"),
            other => println!("{other}"),
        }
    }
}
