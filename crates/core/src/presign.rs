//! Presigned URL generation
//!
//! URLs are signed through the SDK presigner (SigV4 query parameters), so
//! they are honored by any S3-compatible service. Expiration is capped at
//! seven days by the signature scheme itself.

use crate::client::StorageClient;
use crate::error::{Error, Result};
use aws_sdk_s3::presigning::PresigningConfig;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;

/// Client operations that can be presigned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMethod {
    GetObject,
    PutObject,
    DeleteObject,
    HeadObject,
}

impl ClientMethod {
    pub fn as_str(&self) -> &str {
        match self {
            ClientMethod::GetObject => "get_object",
            ClientMethod::PutObject => "put_object",
            ClientMethod::DeleteObject => "delete_object",
            ClientMethod::HeadObject => "head_object",
        }
    }

    /// HTTP method a holder of the URL must use
    pub fn http_method(&self) -> &str {
        match self {
            ClientMethod::GetObject => "GET",
            ClientMethod::PutObject => "PUT",
            ClientMethod::DeleteObject => "DELETE",
            ClientMethod::HeadObject => "HEAD",
        }
    }
}

impl std::fmt::Display for ClientMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClientMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" | "get_object" => Ok(ClientMethod::GetObject),
            "put" | "put_object" => Ok(ClientMethod::PutObject),
            "delete" | "delete_object" => Ok(ClientMethod::DeleteObject),
            "head" | "head_object" => Ok(ClientMethod::HeadObject),
            other => Err(Error::InvalidInput(format!(
                "Unknown client method '{}' (expected get, put, delete, or head)",
                other
            ))),
        }
    }
}

/// Parameters for a presigned operation
#[derive(Debug, Clone)]
pub struct PresignParams {
    /// Bucket override; the client's default bucket when absent
    pub bucket: Option<String>,
    /// Object key
    pub key: String,
    /// Content type the uploader must send (put_object only)
    pub content_type: Option<String>,
}

impl PresignParams {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            bucket: None,
            key: key.into(),
            content_type: None,
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A signed, time-limited request
#[derive(Debug, Clone)]
pub struct PresignedRequest {
    pub method: String,
    pub url: String,
    /// Headers the holder must send along with the request
    pub headers: Vec<(String, String)>,
    pub expires_at: DateTime<Utc>,
}

impl StorageClient {
    /// Presign a client operation on an object
    pub async fn presign(
        &self,
        method: ClientMethod,
        params: &PresignParams,
        expires_in: Duration,
    ) -> Result<PresignedRequest> {
        let config = PresigningConfig::expires_in(expires_in)?;
        let bucket = params.bucket.as_deref().unwrap_or(self.bucket());
        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in)
                .map_err(|e| Error::Policy(format!("Invalid expiration: {}", e)))?;

        let presigned = match method {
            ClientMethod::GetObject => {
                self.inner()
                    .get_object()
                    .bucket(bucket)
                    .key(&params.key)
                    .presigned(config)
                    .await?
            }
            ClientMethod::PutObject => {
                self.inner()
                    .put_object()
                    .bucket(bucket)
                    .key(&params.key)
                    .set_content_type(params.content_type.clone())
                    .presigned(config)
                    .await?
            }
            ClientMethod::DeleteObject => {
                self.inner()
                    .delete_object()
                    .bucket(bucket)
                    .key(&params.key)
                    .presigned(config)
                    .await?
            }
            ClientMethod::HeadObject => {
                self.inner()
                    .head_object()
                    .bucket(bucket)
                    .key(&params.key)
                    .presigned(config)
                    .await?
            }
        };

        Ok(PresignedRequest {
            method: presigned.method().to_string(),
            url: presigned.uri().to_string(),
            headers: presigned
                .headers()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            expires_at,
        })
    }

    /// Presign a download URL
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<PresignedRequest> {
        self.presign(ClientMethod::GetObject, &PresignParams::new(key), expires_in)
            .await
    }

    /// Presign an upload URL
    pub async fn presign_put(
        &self,
        key: &str,
        expires_in: Duration,
        content_type: &str,
    ) -> Result<PresignedRequest> {
        self.presign(
            ClientMethod::PutObject,
            &PresignParams::new(key).with_content_type(content_type),
            expires_in,
        )
        .await
    }

    /// Presign a delete URL
    pub async fn presign_delete(&self, key: &str, expires_in: Duration) -> Result<PresignedRequest> {
        self.presign(ClientMethod::DeleteObject, &PresignParams::new(key), expires_in)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_method_names() {
        assert_eq!(ClientMethod::GetObject.as_str(), "get_object");
        assert_eq!(ClientMethod::PutObject.http_method(), "PUT");
        assert_eq!(ClientMethod::HeadObject.http_method(), "HEAD");
    }

    #[test]
    fn test_client_method_parse() {
        assert_eq!("get".parse::<ClientMethod>().unwrap(), ClientMethod::GetObject);
        assert_eq!(
            "put_object".parse::<ClientMethod>().unwrap(),
            ClientMethod::PutObject
        );
        assert_eq!("DELETE".parse::<ClientMethod>().unwrap(), ClientMethod::DeleteObject);
        assert!("post".parse::<ClientMethod>().is_err());
    }

    #[test]
    fn test_presign_params_builder() {
        let params = PresignParams::new("uploads/report.pdf")
            .with_bucket("other-bucket")
            .with_content_type("application/pdf");

        assert_eq!(params.key, "uploads/report.pdf");
        assert_eq!(params.bucket.as_deref(), Some("other-bucket"));
        assert_eq!(params.content_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_presign_get_produces_signed_url() {
        let client = StorageClient::new(
            "https://storage.example.com".to_string(),
            "auto".to_string(),
            "AKIDEXAMPLE".to_string(),
            "wJalrXUtnFEMI/K7MDENG/bPxRCYEXAMPLEKEY".to_string(),
            "test-bucket".to_string(),
        )
        .await
        .unwrap();

        let request = client
            .presign_get("reports/q2.csv", Duration::from_secs(900))
            .await
            .unwrap();

        assert_eq!(request.method, "GET");
        assert!(request.url.contains("X-Amz-Signature="));
        assert!(request.url.contains("X-Amz-Expires=900"));
        assert!(request.url.contains("reports/q2.csv"));
    }

    #[tokio::test]
    async fn test_presign_rejects_over_seven_days() {
        let client = StorageClient::new(
            "https://storage.example.com".to_string(),
            "auto".to_string(),
            "AKIDEXAMPLE".to_string(),
            "secret".to_string(),
            "test-bucket".to_string(),
        )
        .await
        .unwrap();

        let result = client
            .presign_get("k", Duration::from_secs(604_801))
            .await;
        assert!(result.is_err());
    }
}
