//! Interactive setup wizard for skiff configuration

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password, Select};
use skiff_core::{save_config, validate_config, ConfigFile, StorageConfig};

/// Run the interactive setup wizard
pub async fn run_init_wizard() -> Result<()> {
    println!("🚀 Welcome to skiff setup!\n");

    println!("This wizard will guide you through the configuration process.");
    println!("You will need:");
    println!("  1. Your storage endpoint URL (S3-compatible)");
    println!("  2. Access Key ID + Secret Access Key (or rely on the environment)");
    println!("  3. Your default bucket name\n");

    // Step 1: Endpoint
    let endpoint = prompt_endpoint()?;

    // Step 2: Region
    let region: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Region")
        .default("auto".to_string())
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to get region: {}", e))?;

    // Step 3: Credentials
    let (access_key_id, secret_access_key) = prompt_credentials()?;

    // Step 4: Default bucket
    let default_bucket = prompt_bucket_name()?;

    // Summary
    println!("\n📋 Configuration summary:");
    println!("  Endpoint: {}", endpoint);
    println!("  Region: {}", region);
    println!("  Bucket: {}", default_bucket);
    println!(
        "  Credentials: {}",
        if access_key_id.is_some() {
            "Static keys"
        } else {
            "Environment chain"
        }
    );

    // Confirmation
    let confirm = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Save this configuration?")
        .default(false)
        .interact()?;

    if !confirm {
        println!("❌ Configuration cancelled");
        return Ok(());
    }

    // Create config
    let config = ConfigFile {
        storage: StorageConfig {
            endpoint,
            region,
            access_key_id,
            secret_access_key,
            default_bucket,
            default_expiration: 3600,
        },
        transfer: None,
        logging: None,
        output: None,
    };

    validate_config(&config)?;
    save_config(&config)?;

    println!("\n🎉 Setup complete!");
    println!("\nConfiguration saved to: ~/.config/skiff/config.toml");
    println!("\nYou can now use skiff:");
    println!("  $ skiff objects upload file.txt path/to/file.txt");
    println!("  $ skiff urls sign path/to/file.txt --expires 900");
    println!("  $ skiff post generate uploads/ --starts-with");

    Ok(())
}

/// Prompt for the storage endpoint
fn prompt_endpoint() -> Result<String> {
    Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Storage endpoint URL")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.is_empty() {
                Err("Endpoint cannot be empty")
            } else if !input.starts_with("http://") && !input.starts_with("https://") {
                Err("Endpoint must start with http:// or https://")
            } else {
                Ok(())
            }
        })
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to get endpoint: {}", e))
}

/// Prompt for the credential source
fn prompt_credentials() -> Result<(Option<String>, Option<String>)> {
    let methods = vec![
        "Access Key ID + Secret Access Key",
        "Environment credential chain (env vars, shared credentials, IMDS)",
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Credential source")
        .items(&methods)
        .default(0)
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to select credential source: {}", e))?;

    match selection {
        0 => {
            let access_key = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Access Key ID")
                .validate_with(|input: &String| -> Result<(), &str> {
                    if input.is_empty() {
                        Err("Access Key ID cannot be empty")
                    } else {
                        Ok(())
                    }
                })
                .interact()
                .map_err(|e| anyhow::anyhow!("Failed to get Access Key ID: {}", e))?;

            let secret_key = Password::with_theme(&ColorfulTheme::default())
                .with_prompt("Secret Access Key")
                .validate_with(|input: &String| -> Result<(), &str> {
                    if input.is_empty() {
                        Err("Secret Access Key cannot be empty")
                    } else if input.len() < 20 {
                        Err("Secret Access Key seems too short")
                    } else {
                        Ok(())
                    }
                })
                .interact()
                .map_err(|e| anyhow::anyhow!("Failed to get Secret Access Key: {}", e))?;

            Ok((Some(access_key), Some(secret_key)))
        }
        1 => Ok((None, None)),
        _ => unreachable!(),
    }
}

/// Prompt for default bucket name
fn prompt_bucket_name() -> Result<String> {
    Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Default bucket name")
        .default("my-bucket".to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.is_empty() {
                Err("Bucket name cannot be empty")
            } else if input.len() < 3 {
                Err("Bucket name must be at least 3 characters")
            } else if input.len() > 63 {
                Err("Bucket name must be less than 64 characters")
            } else if !input
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
            {
                Err("Bucket name can only contain lowercase letters, digits, hyphens, and dots")
            } else {
                Ok(())
            }
        })
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to get bucket name: {}", e))
}
