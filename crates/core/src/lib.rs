//! skiff-core - Core library for the skiff CLI
//!
//! This library provides the core functionality for working with S3-compatible
//! object storage: configuration management, object operations, managed
//! multipart transfers, presigned URLs, and POST policy generation.

pub mod client;
pub mod config;
pub mod error;
pub mod post_policy;
pub mod presign;
pub mod transfer;

// Re-export commonly used types
pub use client::{ObjectInfo, ObjectMetadata, StorageClient};
pub use config::{config_exists, get_config_path, load_config, save_config, validate_config};
pub use config::{ConfigFile, LoggingConfig, OutputConfig, StorageConfig, TransferSettings};
pub use error::{Error, Result};
pub use post_policy::{PostCondition, PostPolicyBuilder, PostSigningParams, PresignedPost};
pub use presign::{ClientMethod, PresignParams, PresignedRequest};
pub use transfer::{
    requires_multipart, TransferConfig, TransferManager, TransferProgress, TransferSummary,
};
