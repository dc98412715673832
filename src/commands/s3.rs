//! Handlers for `medstore s3` commands.

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use super::{CommandContext, CommandOutput};
use crate::cli::S3Command;
use crate::config::{BucketRole, Config};
use crate::error::Result;
use crate::objects::{format_bucket_list, BucketListFormat, ObjectOps, RestoreOutcome};
use crate::provision::{DeletionOutcome, EnsureOutcome, ProvisionReport, Provisioner};
use crate::routing;
use crate::storage::StorageClass;

/// Runs one `s3` subcommand.
pub async fn run(ctx: &CommandContext<'_>, command: &S3Command) -> Result<CommandOutput> {
    match command {
        S3Command::Setup => setup(ctx).await,
        S3Command::DeleteBucket { names } => delete_buckets(ctx, names).await,
        S3Command::ListBuckets { nodate, collection } => {
            let format = if *collection {
                BucketListFormat::Collection
            } else if *nodate {
                BucketListFormat::NoDate
            } else {
                BucketListFormat::Detailed
            };
            list_buckets(ctx, format).await
        }
        S3Command::ListContents { bucket } => list_contents(ctx, bucket).await,
        S3Command::Upload { file, bucket } => upload(ctx, file, bucket.as_deref()).await,
        S3Command::Download {
            file,
            bucket,
            output_dir,
        } => download(ctx, file, bucket.as_deref(), output_dir).await,
        S3Command::DeleteFile { file } => delete_file(ctx, file).await,
        S3Command::ListVersions { file } => list_versions(ctx, file).await,
        S3Command::RestoreVersion { file, version_id } => {
            restore_version(ctx, file, version_id).await
        }
        S3Command::SetStorageClass {
            file,
            storage_class,
        } => set_storage_class(ctx, file, *storage_class).await,
        S3Command::StorageClass { file, bucket } => {
            storage_class(ctx, file, bucket.as_deref()).await
        }
        S3Command::Read { file, bucket } => read(ctx, file, bucket.as_deref()).await,
        S3Command::PresignedUrl {
            file,
            expiration,
            bucket,
        } => presigned_url(ctx, file, *expiration, bucket.as_deref()).await,
        S3Command::EnableEncryption { bucket } => {
            enable_encryption(ctx, bucket.as_deref()).await
        }
    }
}

fn report_lines(report: &ProvisionReport) -> Vec<CommandOutput> {
    let mut lines = vec![match report.outcome {
        EnsureOutcome::Created => {
            CommandOutput::info(format!("Bucket '{}' created successfully.", report.bucket))
        }
        EnsureOutcome::AlreadyExists => {
            CommandOutput::info(format!("Bucket '{}' already exists.", report.bucket))
        }
    }];

    for step in &report.steps {
        lines.push(match &step.error {
            None => CommandOutput::info(format!("  {} applied", step.step)),
            Some(error) => CommandOutput::error(format!("  Error applying {}: {}", step.step, error)),
        });
    }
    lines
}

async fn setup(ctx: &CommandContext<'_>) -> Result<CommandOutput> {
    let provisioner = Provisioner::new(ctx.store);
    let (config, reports) = provisioner.setup_buckets(ctx.region).await?;
    config.save_to_file(ctx.config_path)?;

    let mut lines = vec![CommandOutput::info("Setting up S3 buckets...")];
    for report in &reports {
        lines.extend(report_lines(report));
    }
    lines.push(CommandOutput::info(format!(
        "Setup complete. Bucket names saved to '{}'.",
        ctx.config_path.display()
    )));
    Ok(CommandOutput::multiple(lines))
}

async fn delete_buckets(ctx: &CommandContext<'_>, names: &[String]) -> Result<CommandOutput> {
    let outcomes = Provisioner::new(ctx.store).delete_buckets(names).await;

    let mut lines: Vec<CommandOutput> = outcomes
        .iter()
        .map(|o| {
            if o.is_deleted() {
                CommandOutput::info(o.to_string())
            } else {
                CommandOutput::error(o.to_string())
            }
        })
        .collect();

    // A missing config file just means there is nothing to update.
    if ctx.config_path.exists() {
        match clear_deleted_buckets(ctx.config_path, &outcomes) {
            Ok(true) => lines.push(CommandOutput::info("Config file updated.")),
            Ok(false) => {}
            Err(e) => {
                warn!("Config not updated after bucket deletion: {}", e);
                lines.push(CommandOutput::error(format!("Could not update config: {e}")));
            }
        }
    }

    Ok(CommandOutput::multiple(lines))
}

/// Clears config roles naming deleted buckets. Returns true if the file changed.
fn clear_deleted_buckets(path: &Path, outcomes: &[DeletionOutcome]) -> Result<bool> {
    let mut config = Config::load_from_file(path)?;
    let changed = outcomes
        .iter()
        .filter(|o| o.is_deleted())
        .fold(false, |changed, o| config.clear_bucket(&o.bucket) || changed);
    if changed {
        config.save_to_file(path)?;
        info!("Cleared deleted buckets from {}", path.display());
    }
    Ok(changed)
}

async fn list_buckets(ctx: &CommandContext<'_>, format: BucketListFormat) -> Result<CommandOutput> {
    let buckets = ObjectOps::new(ctx.store).list_buckets().await?;
    Ok(CommandOutput::info(format_bucket_list(&buckets, format)))
}

async fn list_contents(ctx: &CommandContext<'_>, bucket: &str) -> Result<CommandOutput> {
    let objects = ObjectOps::new(ctx.store).list_contents(bucket).await?;
    if objects.is_empty() {
        return Ok(CommandOutput::info(format!(
            "No objects found in bucket '{bucket}'."
        )));
    }

    let mut lines = vec![format!("Contents of bucket '{bucket}':")];
    lines.extend(
        objects
            .iter()
            .map(|o| format!("  - Object: {}, Size: {} bytes", o.key, o.size)),
    );
    Ok(CommandOutput::info(lines.join("\n")))
}

async fn upload(ctx: &CommandContext<'_>, file: &Path, bucket: Option<&str>) -> Result<CommandOutput> {
    let bucket = ctx.resolve_bucket(bucket, routing::default_role(file))?;
    let receipt = ObjectOps::new(ctx.store).upload(file, &bucket, None).await?;

    Ok(CommandOutput::info(format!(
        "File '{}' uploaded successfully to '{}' as '{}'.",
        file.display(),
        receipt.bucket,
        receipt.key
    )))
}

async fn download(
    ctx: &CommandContext<'_>,
    key: &str,
    bucket: Option<&str>,
    output_dir: &Path,
) -> Result<CommandOutput> {
    let bucket = ctx.resolve_bucket(bucket, routing::default_role(Path::new(key)))?;
    let path = ObjectOps::new(ctx.store)
        .download(&bucket, key, output_dir, ctx.today)
        .await?;

    Ok(CommandOutput::info(format!(
        "File '{key}' downloaded successfully to '{}'.",
        path.display()
    )))
}

async fn delete_file(ctx: &CommandContext<'_>, key: &str) -> Result<CommandOutput> {
    let bucket = ctx.resolve_bucket(None, BucketRole::Data)?;
    ObjectOps::new(ctx.store).delete_file(&bucket, key).await?;
    Ok(CommandOutput::info(format!("Deleted {key} from {bucket}")))
}

async fn list_versions(ctx: &CommandContext<'_>, key: &str) -> Result<CommandOutput> {
    let bucket = ctx.resolve_bucket(None, BucketRole::Data)?;
    let versions = ObjectOps::new(ctx.store).list_versions(&bucket, key).await?;

    let headers = ["Version ID", "Kind", "Latest", "Last Modified"]
        .map(String::from)
        .to_vec();
    let rows = versions
        .iter()
        .map(|v| {
            vec![
                v.version_id.clone(),
                if v.is_delete_marker { "delete marker" } else { "version" }.to_string(),
                if v.is_latest { "yes" } else { "" }.to_string(),
                v.last_modified.clone().unwrap_or_default(),
            ]
        })
        .collect();

    Ok(CommandOutput::multiple(vec![
        CommandOutput::info(format!("Versions of {key}:")),
        CommandOutput::table(headers, rows),
    ]))
}

async fn restore_version(
    ctx: &CommandContext<'_>,
    key: &str,
    version_id: &str,
) -> Result<CommandOutput> {
    let bucket = ctx.resolve_bucket(None, BucketRole::Data)?;
    let outcome = ObjectOps::new(ctx.store)
        .restore_version(&bucket, key, version_id)
        .await?;

    Ok(match outcome {
        RestoreOutcome::VersionMissing => {
            CommandOutput::error(format!("Version {version_id} of {key} does not exist."))
        }
        RestoreOutcome::Restored {
            removed_delete_marker,
        } => {
            let mut lines = Vec::new();
            if removed_delete_marker {
                lines.push(CommandOutput::info(format!("Removed delete marker for {key}")));
            }
            lines.push(CommandOutput::info(format!(
                "Restored version {version_id} of {key}"
            )));
            CommandOutput::multiple(lines)
        }
    })
}

async fn set_storage_class(
    ctx: &CommandContext<'_>,
    key: &str,
    class: StorageClass,
) -> Result<CommandOutput> {
    let bucket = ctx.resolve_bucket(None, BucketRole::Data)?;
    ObjectOps::new(ctx.store)
        .set_storage_class(&bucket, key, class)
        .await?;
    Ok(CommandOutput::info(format!(
        "Set storage class of {key} to {class}"
    )))
}

async fn storage_class(
    ctx: &CommandContext<'_>,
    key: &str,
    bucket: Option<&str>,
) -> Result<CommandOutput> {
    let bucket = ctx.resolve_bucket(bucket, BucketRole::Data)?;
    let class = ObjectOps::new(ctx.store).storage_class(&bucket, key).await?;
    Ok(CommandOutput::info(format!(
        "Storage class of '{key}' in '{bucket}': {class}"
    )))
}

async fn read(ctx: &CommandContext<'_>, key: &str, bucket: Option<&str>) -> Result<CommandOutput> {
    let bucket = ctx.resolve_bucket(bucket, BucketRole::Data)?;
    let text = ObjectOps::new(ctx.store).read_object(&bucket, key).await?;
    Ok(CommandOutput::info(text))
}

async fn presigned_url(
    ctx: &CommandContext<'_>,
    key: &str,
    expiration: u64,
    bucket: Option<&str>,
) -> Result<CommandOutput> {
    let bucket = ctx.resolve_bucket(bucket, BucketRole::Data)?;
    let url = ObjectOps::new(ctx.store)
        .presigned_url(&bucket, key, Duration::from_secs(expiration))
        .await?;
    Ok(CommandOutput::info(format!(
        "Presigned URL for {key} (expires in {expiration} seconds):\n{url}"
    )))
}

async fn enable_encryption(ctx: &CommandContext<'_>, bucket: Option<&str>) -> Result<CommandOutput> {
    let bucket = ctx.resolve_bucket(bucket, BucketRole::Data)?;
    ObjectOps::new(ctx.store).enable_encryption(&bucket).await?;
    Ok(CommandOutput::info(format!(
        "Enabled server-side encryption for '{bucket}'."
    )))
}
