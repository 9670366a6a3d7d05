//! Storage client over the AWS S3 SDK (works against any S3-compatible endpoint)

use crate::error::{Error, Result};
use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region},
    primitives::ByteStream,
    Client,
};
use std::path::Path;
use tracing::debug;

/// Client for an S3-compatible object store, bound to a default bucket
pub struct StorageClient {
    client: Client,
    bucket: String,
}

impl StorageClient {
    /// Create a client with static credentials
    pub async fn new(
        endpoint: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
        bucket: String,
    ) -> Result<Self> {
        let credentials = Credentials::new(&access_key_id, &secret_access_key, None, None, "skiff");

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new(region))
            .credentials_provider(credentials)
            .build();

        let client = Client::from_conf(config);

        Ok(Self { client, bucket })
    }

    /// Create a client resolving credentials from the environment chain
    /// (env vars, shared credentials file, IMDS)
    pub async fn from_env(endpoint: String, region: String, bucket: String) -> Result<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new(region))
            .load()
            .await;

        Ok(Self {
            client: Client::new(&sdk_config),
            bucket,
        })
    }

    /// Upload a local file with a single PutObject
    ///
    /// For large files prefer [`crate::transfer::TransferManager::upload_file`],
    /// which switches to multipart above its threshold.
    pub async fn upload_file(&self, key: &str, file_path: &Path, content_type: &str) -> Result<()> {
        let body = ByteStream::from_path(file_path).await?;

        debug!(key, path = %file_path.display(), "put_object from file");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await?;

        Ok(())
    }

    /// Upload bytes
    pub async fn put_bytes(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await?;

        Ok(())
    }

    /// Download an object to a local file
    pub async fn download_file(&self, key: &str, dest_path: &Path) -> Result<()> {
        let data = self.get_bytes(key).await?;

        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(dest_path, data).await?;

        Ok(())
    }

    /// Download an object into memory
    pub async fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        debug!(key, bucket = %self.bucket, "get_object");

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;

        let body = response.body.collect().await?.into_bytes();

        Ok(body.to_vec())
    }

    /// List objects in the bucket, following continuation tokens
    pub async fn list_objects(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(prefix.map(|s| s.to_string()))
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page?;
            for obj in page.contents() {
                objects.push(ObjectInfo {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().unwrap_or(0),
                    last_modified: obj.last_modified().cloned(),
                    etag: obj.e_tag().unwrap_or_default().to_string(),
                });
            }
        }

        Ok(objects)
    }

    /// List buckets visible to the credentials
    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        let response = self.client.list_buckets().send().await?;

        Ok(response
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(|n| n.to_string()))
            .collect())
    }

    /// Delete an object
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;

        Ok(())
    }

    /// Delete multiple objects
    pub async fn delete_objects(&self, keys: Vec<String>) -> Result<()> {
        for key in keys {
            self.delete_object(&key).await?;
        }
        Ok(())
    }

    /// Check if an object exists
    pub async fn object_exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(Error::Storage(service_err.to_string()))
                }
            }
        }
    }

    /// Get object metadata
    pub async fn head_object(&self, key: &str) -> Result<ObjectMetadata> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Error::NotFound(key.to_string())
                } else {
                    Error::Storage(service_err.to_string())
                }
            })?;

        Ok(ObjectMetadata {
            key: key.to_string(),
            size: response.content_length().unwrap_or(0),
            content_type: response.content_type().unwrap_or_default().to_string(),
            last_modified: response.last_modified().cloned(),
            etag: response.e_tag().unwrap_or_default().to_string(),
        })
    }

    /// Copy an object within the bucket
    pub async fn copy_object(&self, source_key: &str, dest_key: &str) -> Result<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(dest_key)
            .copy_source(format!("{}/{}", self.bucket, source_key))
            .send()
            .await?;

        Ok(())
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Access the underlying SDK client
    pub(crate) fn inner(&self) -> &Client {
        &self.client
    }

    /// Wrap a preconfigured SDK client (used with replayed HTTP clients)
    #[cfg(test)]
    pub(crate) fn for_tests(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

/// Object information from a listing
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<aws_smithy_types::DateTime>,
    pub etag: String,
}

/// Object metadata from HeadObject
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: i64,
    pub content_type: String,
    pub last_modified: Option<aws_smithy_types::DateTime>,
    pub etag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_info() {
        let info = ObjectInfo {
            key: "reports/2026/q2.parquet".to_string(),
            size: 1024,
            last_modified: Some(aws_smithy_types::DateTime::from_secs(0)),
            etag: "abc123".to_string(),
        };

        assert_eq!(info.key, "reports/2026/q2.parquet");
        assert_eq!(info.size, 1024);
    }

    #[tokio::test]
    async fn test_client_holds_bucket() {
        let client = StorageClient::new(
            "https://storage.example.com".to_string(),
            "auto".to_string(),
            "AKIDEXAMPLE".to_string(),
            "secret".to_string(),
            "test-bucket".to_string(),
        )
        .await
        .unwrap();

        assert_eq!(client.bucket(), "test-bucket");
    }
}
