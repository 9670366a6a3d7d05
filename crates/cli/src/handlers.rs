//! Command handlers for the skiff CLI

use crate::wizard::run_init_wizard;
use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Shell as ClapShell};
use indicatif::{ProgressBar, ProgressStyle};
use skiff_core::{
    get_config_path, load_config, validate_config, ConfigFile, PostPolicyBuilder,
    PostSigningParams, PresignParams, StorageClient, TransferConfig, TransferManager,
};
use std::path::Path;
use std::time::Duration;
use tabled::{Table, Tabled};

/// Handle init command
pub async fn handle_init() -> Result<()> {
    run_init_wizard().await
}

/// Build a storage client from the configuration, honoring a bucket override
async fn make_client(bucket: Option<&str>) -> Result<(ConfigFile, StorageClient)> {
    let config = load_config()?;
    let bucket = bucket
        .unwrap_or(&config.storage.default_bucket)
        .to_string();

    tracing::debug!(bucket, endpoint = %config.storage.endpoint, "building storage client");

    let client = match (
        config.storage.access_key_id.clone(),
        config.storage.secret_access_key.clone(),
    ) {
        (Some(access_key_id), Some(secret_access_key)) => {
            StorageClient::new(
                config.storage.endpoint.clone(),
                config.storage.region.clone(),
                access_key_id,
                secret_access_key,
                bucket,
            )
            .await?
        }
        _ => {
            StorageClient::from_env(
                config.storage.endpoint.clone(),
                config.storage.region.clone(),
                bucket,
            )
            .await?
        }
    };

    Ok((config, client))
}

fn transfer_config(config: &ConfigFile) -> TransferConfig {
    config
        .transfer
        .as_ref()
        .map(TransferConfig::from)
        .unwrap_or_default()
}

/// Handle config commands
pub async fn handle_config(action: &str) -> Result<()> {
    match action {
        "show" => {
            println!("Current configuration:");
            println!();

            let config = load_config()?;

            println!("Storage:");
            println!("  Endpoint: {}", config.storage.endpoint);
            println!("  Region: {}", config.storage.region);
            println!(
                "  Credentials: {}",
                if config.storage.has_static_keys() {
                    "Static keys"
                } else {
                    "Environment chain"
                }
            );
            println!("  Default bucket: {}", config.storage.default_bucket);
            println!(
                "  Default expiration: {}s",
                config.storage.default_expiration
            );

            if let Some(transfer) = &config.transfer {
                println!();
                println!("Transfer:");
                println!("  Multipart threshold: {}MB", transfer.multipart_threshold_mb);
                println!("  Part size: {}MB", transfer.part_size_mb);
                println!("  Max concurrency: {}", transfer.max_concurrency);
            }

            Ok(())
        }
        "validate" => {
            println!("Validating configuration...");

            let config = load_config()?;

            validate_config(&config)?;
            println!("  ✅ Valid configuration format");

            println!("  Testing storage connection...");
            let (_, client) = make_client(None).await?;

            // Listing is the cheapest call that exercises the credentials
            let _objects = client.list_objects(None).await?;

            println!("  ✅ Valid configuration!");
            println!("  ✅ Storage connection successful!");

            Ok(())
        }
        "edit" => {
            println!("Opening editor...");
            println!("  File: ~/.config/skiff/config.toml");
            println!();

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
            let config_path = get_config_path()?;

            let status = std::process::Command::new(editor)
                .arg(&config_path)
                .status()?;

            if status.success() {
                println!("  ✅ Configuration edited");

                // Validate after edit
                let config = load_config()?;
                validate_config(&config)?;
                println!("  ✅ Configuration valid");
            } else {
                println!("  ⚠️  Editor exited with error");
            }

            Ok(())
        }
        _ => {
            println!("Unknown action: {}", action);
            println!("Available actions: show, edit, validate");
            Ok(())
        }
    }
}

fn make_progress_bar(total: u64) -> Result<ProgressBar> {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(bar)
}

/// Handle objects upload
pub async fn handle_upload(
    file: &str,
    key: &str,
    bucket: Option<&str>,
    progress: bool,
) -> Result<()> {
    let path = Path::new(file);
    if !path.exists() {
        return Err(anyhow::anyhow!("File not found: {}", file));
    }

    let file_size = path.metadata()?.len();

    let (config, client) = make_client(bucket).await?;
    let manager = TransferManager::new(&client, transfer_config(&config));

    println!("Uploading {} -> {}/{}...", file, client.bucket(), key);
    println!("  Size: {}", format_bytes(file_size as i64));

    // Detect content type
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();

    let summary = if progress {
        let bar = make_progress_bar(file_size)?;
        let bar_ref = bar.clone();
        let on_progress = move |p: skiff_core::TransferProgress| {
            bar_ref.set_length(p.total);
            bar_ref.set_position(p.transferred);
        };
        let on_progress: &skiff_core::transfer::ProgressFn = &on_progress;
        let summary = manager
            .upload_file(path, key, &content_type, Some(on_progress))
            .await?;
        bar.finish_and_clear();
        summary
    } else {
        manager.upload_file(path, key, &content_type, None).await?
    };

    if summary.parts > 1 {
        println!("  ✅ Upload complete ({} parts)", summary.parts);
    } else {
        println!("  ✅ Upload complete");
    }

    Ok(())
}

/// Handle objects download
pub async fn handle_download(
    key: &str,
    dest: &str,
    bucket: Option<&str>,
    progress: bool,
) -> Result<()> {
    let (config, client) = make_client(bucket).await?;
    let manager = TransferManager::new(&client, transfer_config(&config));

    println!("Downloading {}/{} -> {}...", client.bucket(), key, dest);

    let summary = if progress {
        let bar = make_progress_bar(0)?;
        let bar_ref = bar.clone();
        let on_progress = move |p: skiff_core::TransferProgress| {
            bar_ref.set_length(p.total);
            bar_ref.set_position(p.transferred);
        };
        let on_progress: &skiff_core::transfer::ProgressFn = &on_progress;
        let summary = manager
            .download_file(key, Path::new(dest), Some(on_progress))
            .await?;
        bar.finish_and_clear();
        summary
    } else {
        manager.download_file(key, Path::new(dest), None).await?
    };

    println!(
        "  ✅ Download complete ({})",
        format_bytes(summary.bytes as i64)
    );

    Ok(())
}

/// Handle objects rm
pub async fn handle_delete(key: &str, bucket: Option<&str>) -> Result<()> {
    let (_, client) = make_client(bucket).await?;

    println!("Deleting {}/{}...", client.bucket(), key);
    client.delete_object(key).await?;
    println!("  ✅ Object deleted");

    Ok(())
}

/// Handle objects ls
pub async fn handle_list(prefix: Option<&str>, bucket: Option<&str>) -> Result<()> {
    let (_, client) = make_client(bucket).await?;

    println!("Listing objects in '{}' (prefix: {:?})...", client.bucket(), prefix);

    let objects = client.list_objects(prefix).await?;

    if objects.is_empty() {
        println!("  No objects found");
    } else {
        #[derive(Tabled)]
        struct ObjectRow {
            key: String,
            size: String,
            modified: String,
        }

        let rows: Vec<ObjectRow> = objects
            .iter()
            .map(|o| ObjectRow {
                key: o.key.clone(),
                size: format_bytes(o.size),
                modified: format_smithy_date(o.last_modified.as_ref()),
            })
            .collect();

        println!();
        println!("{}", Table::new(rows));
    }

    Ok(())
}

/// Handle objects stat
pub async fn handle_stat(key: &str, bucket: Option<&str>) -> Result<()> {
    let (_, client) = make_client(bucket).await?;

    let metadata = client.head_object(key).await?;

    println!("Object {}/{}:", client.bucket(), key);
    println!("  Size: {}", format_bytes(metadata.size));
    println!("  Content type: {}", metadata.content_type);
    println!(
        "  Last modified: {}",
        format_smithy_date(metadata.last_modified.as_ref())
    );
    println!("  ETag: {}", metadata.etag);

    Ok(())
}

/// Handle urls sign
pub async fn handle_sign_url(
    key: &str,
    method: &str,
    expires: Option<u64>,
    content_type: Option<&str>,
    bucket: Option<&str>,
    output: &str,
) -> Result<()> {
    let (config, client) = make_client(bucket).await?;
    let expires = expires.unwrap_or(config.storage.default_expiration);

    let method: skiff_core::ClientMethod = method.parse()?;
    let mut params = PresignParams::new(key);
    if let Some(ct) = content_type {
        params = params.with_content_type(ct);
    }

    println!(
        "Generating presigned {} URL for {} (expires: {}s)...",
        method.http_method(),
        key,
        expires
    );

    let request = client
        .presign(method, &params, Duration::from_secs(expires))
        .await?;

    match output {
        "json" => {
            let headers: serde_json::Map<String, serde_json::Value> = request
                .headers
                .iter()
                .map(|(n, v)| (n.clone(), serde_json::Value::String(v.clone())))
                .collect();
            println!();
            println!(
                "{}",
                serde_json::json!({
                    "key": key,
                    "method": request.method,
                    "url": request.url,
                    "headers": headers,
                    "expires_in": expires,
                    "expires_at": request.expires_at,
                })
            );
        }
        _ => {
            println!();
            println!("  ✅ URL generated:");
            println!("  {}", request.url);
            for (name, value) in &request.headers {
                println!("  Header: {}: {}", name, value);
            }
            println!();
            println!(
                "  Expires: {}",
                request.expires_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
    }

    Ok(())
}

/// Arguments for `post generate`
pub struct PostPolicyArgs {
    pub key: String,
    pub starts_with: bool,
    pub expires: Option<u64>,
    pub content_type: Option<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub bucket: Option<String>,
    pub output: String,
}

/// S3 single-upload ceiling (5TB), used when only a minimum size is given
const MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024 * 1024;

/// Handle post generate
pub async fn handle_post_policy(args: PostPolicyArgs) -> Result<()> {
    let config = load_config()?;
    let bucket = args
        .bucket
        .unwrap_or_else(|| config.storage.default_bucket.clone());
    let expires = args.expires.unwrap_or(config.storage.default_expiration);

    let signing = PostSigningParams::from_storage_config(&config.storage)?;

    let mut builder =
        PostPolicyBuilder::new(&bucket, &args.key).expires_in(Duration::from_secs(expires));

    if args.starts_with {
        builder = builder.key_starts_with(&args.key);
    }
    if let Some(ct) = &args.content_type {
        builder = builder.field("Content-Type", ct);
    }
    if args.min_size.is_some() || args.max_size.is_some() {
        builder = builder.content_length_range(
            args.min_size.unwrap_or(0),
            args.max_size.unwrap_or(MAX_OBJECT_SIZE),
        );
    }

    println!(
        "Generating POST policy for {}/{} (expires: {}s)...",
        bucket, args.key, expires
    );

    let post = builder.build(&signing)?;

    match args.output.as_str() {
        "json" => {
            let fields: serde_json::Map<String, serde_json::Value> = post
                .fields
                .iter()
                .map(|(n, v)| (n.clone(), serde_json::Value::String(v.clone())))
                .collect();
            println!();
            println!(
                "{}",
                serde_json::json!({
                    "url": post.url,
                    "fields": fields,
                })
            );
        }
        _ => {
            println!();
            println!("  ✅ POST policy generated:");
            println!("  URL: {}", post.url);
            println!();

            #[derive(Tabled)]
            struct FieldRow {
                field: String,
                value: String,
            }

            let rows: Vec<FieldRow> = post
                .fields
                .iter()
                .map(|(n, v)| FieldRow {
                    field: n.clone(),
                    value: truncate(v, 60),
                })
                .collect();

            println!("{}", Table::new(rows));
            println!();
            println!("  Submit these as form fields, with the file part last.");
        }
    }

    Ok(())
}

/// Handle buckets list
pub async fn handle_buckets_list() -> Result<()> {
    let (config, client) = make_client(None).await?;

    println!("Listing buckets...");
    println!();

    let buckets = client.list_buckets().await?;

    if buckets.is_empty() {
        println!("  No buckets found");
    } else {
        for bucket in &buckets {
            if *bucket == config.storage.default_bucket {
                println!("  {} (default)", bucket);
            } else {
                println!("  {}", bucket);
            }
        }
    }

    Ok(())
}

/// Handle doctor commands
pub async fn handle_doctor(action: &str) -> Result<()> {
    match action {
        "check" => {
            println!("Checking skiff installation...");

            println!("  ✅ skiff is installed");
            println!("  Version: {}", env!("CARGO_PKG_VERSION"));

            // Check config
            let config_path = get_config_path()?;
            if config_path.exists() {
                println!("  ✅ Configuration found");

                let config = load_config()?;
                validate_config(&config)?;
                println!("  ✅ Configuration valid");
            } else {
                println!("  ⚠️  Configuration not found (run 'skiff init')");
            }

            Ok(())
        }
        "test-connection" => {
            println!("Testing storage connection...");

            let (_, client) = make_client(None).await?;

            let _objects = client.list_objects(None).await?;
            println!("  ✅ Storage connection OK");

            Ok(())
        }
        _ => {
            println!("Unknown action: {}", action);
            println!("Available actions: check, test-connection");
            Ok(())
        }
    }
}

/// Format bytes to human-readable size
fn format_bytes(bytes: i64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format a smithy DateTime to a readable timestamp
fn format_smithy_date(date: Option<&aws_smithy_types::DateTime>) -> String {
    match date {
        Some(d) => chrono::DateTime::from_timestamp(d.secs(), 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| d.secs().to_string()),
        None => "-".to_string(),
    }
}

/// Truncate long values for table display, respecting char boundaries
fn truncate(value: &str, max: usize) -> String {
    if value.len() <= max {
        return value.to_string();
    }
    let mut cut = max;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &value[..cut])
}

#[cfg(test)]
mod tests {
    use super::{format_bytes, truncate};

    #[test]
    fn test_truncate_keeps_short_values() {
        assert_eq!(truncate("uploads/report.pdf", 60), "uploads/report.pdf");
    }

    #[test]
    fn test_truncate_ascii() {
        let long = "a".repeat(80);
        assert_eq!(truncate(&long, 60), format!("{}...", "a".repeat(60)));
    }

    #[test]
    fn test_truncate_lands_on_char_boundary() {
        // 1 ascii byte + 30 three-byte chars = 91 bytes; byte 60 falls
        // inside a character
        let key = format!("a{}", "あ".repeat(30));
        let out = truncate(&key, 60);
        assert!(out.ends_with("..."));
        assert_eq!(out.trim_end_matches("...").len(), 58);
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(512), "512.00 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
    }
}

/// Handle shell completion generation
pub async fn handle_completion(shell: &str, cmd: &mut Command) -> Result<()> {
    use std::io;

    let clap_shell = match shell {
        "bash" => ClapShell::Bash,
        "zsh" => ClapShell::Zsh,
        "fish" => ClapShell::Fish,
        "elvish" => ClapShell::Elvish,
        "powershell" | "pwsh" => ClapShell::PowerShell,
        _ => {
            return Err(anyhow::anyhow!(
                "Unsupported shell: {}\nSupported shells: bash, zsh, fish, elvish, powershell",
                shell
            ));
        }
    };

    generate(clap_shell, cmd, "skiff", &mut io::stdout());

    Ok(())
}
