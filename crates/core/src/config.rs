//! Configuration management for skiff

use crate::error::{Error, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration directory name
const CONFIG_DIR: &str = "skiff";

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// SigV4 ceiling on presigned expiration (7 days)
pub const MAX_EXPIRATION_SECS: u64 = 604_800;

/// S3 minimum multipart part size (5MB)
pub const MIN_PART_SIZE_MB: usize = 5;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub storage: StorageConfig,
    pub transfer: Option<TransferSettings>,
    pub logging: Option<LoggingConfig>,
    pub output: Option<OutputConfig>,
}

/// Storage endpoint and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,

    // Static keys; when absent the aws-config environment chain is used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    pub default_bucket: String,
    #[serde(default = "default_expiration")]
    pub default_expiration: u64,
}

impl StorageConfig {
    /// Whether static keys are configured (as opposed to the environment chain)
    pub fn has_static_keys(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

/// Transfer manager tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Objects at or above this size go through multipart (MB)
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_mb: usize,
    /// Multipart part size (MB)
    #[serde(default = "default_part_size")]
    pub part_size_mb: usize,
    /// In-flight part requests per transfer
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            multipart_threshold_mb: default_multipart_threshold(),
            part_size_mb: default_part_size(),
            max_concurrency: default_max_concurrency(),
            max_retries: default_max_retries(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_format")]
    pub default_format: String,
    #[serde(default = "default_color")]
    pub color: String,
}

// Default values
fn default_region() -> String {
    "auto".to_string()
}

fn default_expiration() -> u64 {
    3600 // 1 hour
}

fn default_multipart_threshold() -> usize {
    16 // 16MB
}

fn default_part_size() -> usize {
    16 // 16MB
}

fn default_max_concurrency() -> usize {
    8
}

fn default_max_retries() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_output_format() -> String {
    "table".to_string()
}

fn default_color() -> String {
    "auto".to_string()
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let home =
        home_dir().ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
    let config_dir = home.join(".config").join(CONFIG_DIR);

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
    }

    Ok(config_dir)
}

/// Get the configuration file path
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Load configuration from file
pub fn load_config() -> Result<ConfigFile> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        return Err(Error::ConfigNotFound(config_path));
    }

    let content = fs::read_to_string(&config_path)
        .map_err(|e| Error::InvalidConfig(format!("Failed to read config file: {}", e)))?;

    let config: ConfigFile = toml::from_str(&content)
        .map_err(|e| Error::InvalidConfig(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let config_path = get_config_path()?;

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::InvalidConfig(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

    // Config holds credentials: owner read/write only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&config_path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&config_path, perms)?;
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &ConfigFile) -> Result<()> {
    // Endpoint must be an absolute http(s) URI with a host
    let uri: http::Uri = config
        .storage
        .endpoint
        .parse()
        .map_err(|e| Error::InvalidInput(format!("Invalid endpoint URL: {}", e)))?;

    if uri.host().is_none() {
        return Err(Error::InvalidInput("Endpoint has no host".to_string()));
    }

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => {
            return Err(Error::InvalidInput(
                "Endpoint must use http or https".to_string(),
            ));
        }
    }

    // Either both keys or neither (environment chain)
    let has_key = config.storage.access_key_id.is_some();
    let has_secret = config.storage.secret_access_key.is_some();
    if has_key != has_secret {
        return Err(Error::Config(
            "access_key_id and secret_access_key must be configured together".to_string(),
        ));
    }

    validate_bucket_name(&config.storage.default_bucket)?;

    if config.storage.default_expiration == 0
        || config.storage.default_expiration > MAX_EXPIRATION_SECS
    {
        return Err(Error::InvalidInput(format!(
            "default_expiration must be between 1 and {} seconds (7 days)",
            MAX_EXPIRATION_SECS
        )));
    }

    if let Some(transfer) = &config.transfer {
        if transfer.part_size_mb < MIN_PART_SIZE_MB {
            return Err(Error::InvalidInput(format!(
                "part_size_mb must be at least {} (S3 multipart minimum)",
                MIN_PART_SIZE_MB
            )));
        }
        if transfer.max_concurrency == 0 {
            return Err(Error::InvalidInput(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate a bucket name (S3 naming rules, simplified)
pub fn validate_bucket_name(name: &str) -> Result<()> {
    if name.len() < 3 || name.len() > 63 {
        return Err(Error::InvalidInput(format!(
            "Bucket name must be 3-63 characters (got {})",
            name.len()
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(Error::InvalidInput(
            "Bucket name can only contain lowercase letters, digits, hyphens, and dots".to_string(),
        ));
    }
    Ok(())
}

/// Check if configuration exists
pub fn config_exists() -> bool {
    get_config_path().map(|p| p.exists()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_valid_config() -> ConfigFile {
        ConfigFile {
            storage: StorageConfig {
                endpoint: "https://storage.example.com".to_string(),
                region: "auto".to_string(),
                access_key_id: Some("AKIDEXAMPLE".to_string()),
                secret_access_key: Some("secret_example_key".to_string()),
                default_bucket: "test-bucket".to_string(),
                default_expiration: 3600,
            },
            transfer: None,
            logging: None,
            output: None,
        }
    }

    #[test]
    fn test_validate_config_valid() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_bad_endpoint() {
        let mut config = make_valid_config();
        config.storage.endpoint = "not a url".to_string();
        assert!(validate_config(&config).is_err());

        config.storage.endpoint = "ftp://storage.example.com".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_env_chain_allowed() {
        let mut config = make_valid_config();
        config.storage.access_key_id = None;
        config.storage.secret_access_key = None;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_half_configured_keys() {
        let mut config = make_valid_config();
        config.storage.secret_access_key = None;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_empty_bucket() {
        let mut config = make_valid_config();
        config.storage.default_bucket = "".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bucket_name_charset() {
        assert!(validate_bucket_name("my-bucket.backups").is_ok());
        assert!(validate_bucket_name("My-Bucket").is_err());
        assert!(validate_bucket_name("ab").is_err());
    }

    #[test]
    fn test_validate_config_expiration_too_long() {
        let mut config = make_valid_config();
        config.storage.default_expiration = MAX_EXPIRATION_SECS + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_expiration_boundary() {
        let mut config = make_valid_config();
        config.storage.default_expiration = MAX_EXPIRATION_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_part_size_floor() {
        let mut config = make_valid_config();
        config.transfer = Some(TransferSettings {
            part_size_mb: 4,
            ..TransferSettings::default()
        });
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_transfer_settings_roundtrip() {
        let settings: TransferSettings = toml::from_str("").unwrap();
        assert_eq!(settings.multipart_threshold_mb, 16);
        assert_eq!(settings.part_size_mb, 16);
        assert_eq!(settings.max_concurrency, 8);
    }
}
