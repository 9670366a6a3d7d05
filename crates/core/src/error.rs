//! Error types for skiff-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for skiff-core
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for skiff-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidConfig(String),

    /// Storage operation errors (S3 API)
    #[error("Storage operation failed: {0}")]
    Storage(String),

    /// Presigning / POST policy errors
    #[error("Signing error: {0}")]
    Policy(String),

    /// Multipart transfer failure, reported after the pending upload was aborted
    #[error("Transfer of '{key}' failed (multipart upload {upload_id} aborted): {reason}")]
    TransferAborted {
        key: String,
        upload_id: String,
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<aws_sdk_s3::Error> for Error {
    fn from(err: aws_sdk_s3::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

// Generic SdkError conversion for all S3 operations
impl<E> From<aws_sdk_s3::error::SdkError<E>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: aws_sdk_s3::error::SdkError<E>) -> Self {
        Error::Storage(err.to_string())
    }
}

// ByteStreamError conversion
impl From<aws_sdk_s3::primitives::ByteStreamError> for Error {
    fn from(err: aws_sdk_s3::primitives::ByteStreamError) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<aws_sdk_s3::presigning::PresigningConfigError> for Error {
    fn from(err: aws_sdk_s3::presigning::PresigningConfigError) -> Self {
        Error::Policy(err.to_string())
    }
}
