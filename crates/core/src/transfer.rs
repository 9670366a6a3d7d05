//! Managed object transfers: multipart upload and ranged download
//!
//! Transfers above a size threshold are split into parts and run with
//! bounded concurrency; smaller objects go through a single request.

use crate::client::StorageClient;
use crate::config::TransferSettings;
use crate::error::{Error, Result};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::byte_stream::{ByteStream, Length};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tracing::{debug, warn};

const MB: u64 = 1024 * 1024;

/// S3 minimum part size (all parts but the last)
pub const MIN_PART_SIZE: u64 = 5 * MB;

/// S3 ceiling on part numbers
pub const MAX_PARTS: u64 = 10_000;

/// Transfer manager tuning
#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    /// Objects at or above this size use multipart / ranged transfers
    pub multipart_threshold: u64,
    /// Target part size in bytes
    pub part_size: u64,
    /// In-flight part requests per transfer
    pub max_concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: 16 * MB,
            part_size: 16 * MB,
            max_concurrency: 8,
        }
    }
}

impl From<&TransferSettings> for TransferConfig {
    fn from(settings: &TransferSettings) -> Self {
        Self {
            multipart_threshold: settings.multipart_threshold_mb as u64 * MB,
            part_size: (settings.part_size_mb as u64 * MB).max(MIN_PART_SIZE),
            max_concurrency: settings.max_concurrency.max(1),
        }
    }
}

/// Whether an object of this size goes through multipart
pub fn requires_multipart(size: u64, config: &TransferConfig) -> bool {
    size >= config.multipart_threshold && size > MIN_PART_SIZE
}

/// Part size to use for an object, respecting the 5MB floor and the
/// 10_000-part ceiling
pub fn effective_part_size(size: u64, config: &TransferConfig) -> u64 {
    let floor = size.div_ceil(MAX_PARTS);
    config.part_size.max(MIN_PART_SIZE).max(floor)
}

/// Progress of a running transfer
#[derive(Debug, Clone, Copy)]
pub struct TransferProgress {
    pub transferred: u64,
    pub total: u64,
}

/// Progress callback, invoked after each completed part or chunk
pub type ProgressFn = dyn Fn(TransferProgress) + Send + Sync;

/// Outcome of a completed transfer
#[derive(Debug, Clone, Copy)]
pub struct TransferSummary {
    pub bytes: u64,
    pub parts: usize,
}

/// Managed transfers on top of a [`StorageClient`]
pub struct TransferManager<'a> {
    client: &'a StorageClient,
    config: TransferConfig,
}

impl<'a> TransferManager<'a> {
    pub fn new(client: &'a StorageClient, config: TransferConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Upload a local file, switching to multipart above the threshold
    pub async fn upload_file(
        &self,
        file_path: &Path,
        key: &str,
        content_type: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<TransferSummary> {
        let size = tokio::fs::metadata(file_path).await?.len();

        if !requires_multipart(size, &self.config) {
            self.client.upload_file(key, file_path, content_type).await?;
            if let Some(cb) = progress {
                cb(TransferProgress {
                    transferred: size,
                    total: size,
                });
            }
            return Ok(TransferSummary {
                bytes: size,
                parts: 1,
            });
        }

        let create = self
            .client
            .inner()
            .create_multipart_upload()
            .bucket(self.client.bucket())
            .key(key)
            .content_type(content_type)
            .send()
            .await?;

        let upload_id = create
            .upload_id()
            .ok_or_else(|| Error::Storage("CreateMultipartUpload returned no upload id".to_string()))?
            .to_string();

        debug!(key, upload_id, size, "multipart upload started");

        match self
            .upload_parts(file_path, key, size, &upload_id, progress)
            .await
        {
            Ok(parts) => {
                let part_count = parts.len();
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();

                let complete = self
                    .client
                    .inner()
                    .complete_multipart_upload()
                    .bucket(self.client.bucket())
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await;

                match complete {
                    Ok(_) => Ok(TransferSummary {
                        bytes: size,
                        parts: part_count,
                    }),
                    // A failed completion leaves the upload pending server-side
                    // just like a failed part does
                    Err(e) => Err(self.abort_upload(key, upload_id, Error::from(e)).await),
                }
            }
            Err(e) => Err(self.abort_upload(key, upload_id, e).await),
        }
    }

    /// Abort a pending multipart upload and fold the cause into a
    /// [`Error::TransferAborted`]
    async fn abort_upload(&self, key: &str, upload_id: String, cause: Error) -> Error {
        warn!(key, upload_id, error = %cause, "multipart upload failed, aborting");

        if let Err(abort_err) = self
            .client
            .inner()
            .abort_multipart_upload()
            .bucket(self.client.bucket())
            .key(key)
            .upload_id(&upload_id)
            .send()
            .await
        {
            warn!(key, upload_id, error = %abort_err, "abort failed, upload may be left pending");
        }

        Error::TransferAborted {
            key: key.to_string(),
            upload_id,
            reason: cause.to_string(),
        }
    }

    async fn upload_parts(
        &self,
        file_path: &Path,
        key: &str,
        size: u64,
        upload_id: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<Vec<CompletedPart>> {
        let part_size = effective_part_size(size, &self.config);
        let part_count = size.div_ceil(part_size);
        let transferred = AtomicU64::new(0);
        let transferred = &transferred;

        let mut parts: Vec<CompletedPart> = stream::iter(0..part_count)
            .map(|index| {
                let offset = index * part_size;
                let length = part_size.min(size - offset);
                async move {
                    let body = ByteStream::read_from()
                        .path(file_path)
                        .offset(offset)
                        .length(Length::Exact(length))
                        .build()
                        .await?;

                    let part_number = (index + 1) as i32;
                    let response = self
                        .client
                        .inner()
                        .upload_part()
                        .bucket(self.client.bucket())
                        .key(key)
                        .upload_id(upload_id)
                        .part_number(part_number)
                        .body(body)
                        .send()
                        .await?;

                    let done = transferred.fetch_add(length, Ordering::Relaxed) + length;
                    if let Some(cb) = progress {
                        cb(TransferProgress {
                            transferred: done,
                            total: size,
                        });
                    }

                    Ok::<CompletedPart, Error>(
                        CompletedPart::builder()
                            .set_e_tag(response.e_tag().map(|t| t.to_string()))
                            .part_number(part_number)
                            .build(),
                    )
                }
            })
            .buffer_unordered(self.config.max_concurrency)
            .try_collect()
            .await?;

        // buffer_unordered yields in completion order; CompleteMultipartUpload
        // requires ascending part numbers
        parts.sort_by_key(|p| p.part_number());

        Ok(parts)
    }

    /// Download an object to a local file, using ranged part reads above
    /// the threshold
    pub async fn download_file(
        &self,
        key: &str,
        dest_path: &Path,
        progress: Option<&ProgressFn>,
    ) -> Result<TransferSummary> {
        let metadata = self.client.head_object(key).await?;
        let size = metadata.size.max(0) as u64;

        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if !requires_multipart(size, &self.config) {
            return self.download_single(key, dest_path, size, progress).await;
        }

        self.download_ranged(key, dest_path, size, progress).await
    }

    async fn download_single(
        &self,
        key: &str,
        dest_path: &Path,
        size: u64,
        progress: Option<&ProgressFn>,
    ) -> Result<TransferSummary> {
        let mut response = self
            .client
            .inner()
            .get_object()
            .bucket(self.client.bucket())
            .key(key)
            .send()
            .await?;

        let mut file = tokio::fs::File::create(dest_path).await?;
        let mut written = 0u64;

        while let Some(chunk) = response.body.try_next().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(cb) = progress {
                cb(TransferProgress {
                    transferred: written,
                    total: size,
                });
            }
        }
        file.flush().await?;

        Ok(TransferSummary {
            bytes: written,
            parts: 1,
        })
    }

    async fn download_ranged(
        &self,
        key: &str,
        dest_path: &Path,
        size: u64,
        progress: Option<&ProgressFn>,
    ) -> Result<TransferSummary> {
        let part_size = effective_part_size(size, &self.config);
        let part_count = size.div_ceil(part_size);

        debug!(key, size, part_count, "ranged download started");

        // Preallocate so each part can be written at its offset
        let file = tokio::fs::File::create(dest_path).await?;
        file.set_len(size).await?;
        drop(file);

        let transferred = AtomicU64::new(0);
        let transferred = &transferred;

        stream::iter(0..part_count)
            .map(|index| {
                let start = index * part_size;
                let end = (start + part_size).min(size) - 1;
                async move {
                    let response = self
                        .client
                        .inner()
                        .get_object()
                        .bucket(self.client.bucket())
                        .key(key)
                        .range(format!("bytes={}-{}", start, end))
                        .send()
                        .await?;

                    let data = response.body.collect().await?.into_bytes();

                    let mut file = tokio::fs::OpenOptions::new()
                        .write(true)
                        .open(dest_path)
                        .await?;
                    file.seek(SeekFrom::Start(start)).await?;
                    file.write_all(&data).await?;

                    let done =
                        transferred.fetch_add(data.len() as u64, Ordering::Relaxed) + data.len() as u64;
                    if let Some(cb) = progress {
                        cb(TransferProgress {
                            transferred: done,
                            total: size,
                        });
                    }

                    Ok::<(), Error>(())
                }
            })
            .buffer_unordered(self.config.max_concurrency)
            .try_collect::<Vec<()>>()
            .await?;

        Ok(TransferSummary {
            bytes: size,
            parts: part_count as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_multipart_threshold() {
        let config = TransferConfig::default();
        assert!(!requires_multipart(1024, &config));
        assert!(!requires_multipart(16 * MB - 1, &config));
        assert!(requires_multipart(16 * MB, &config));
        assert!(requires_multipart(5 * 1024 * MB, &config));
    }

    #[test]
    fn test_small_threshold_still_respects_part_floor() {
        let config = TransferConfig {
            multipart_threshold: MB,
            ..TransferConfig::default()
        };
        // Below the 5MB minimum part size a multipart upload is pointless
        assert!(!requires_multipart(2 * MB, &config));
        assert!(requires_multipart(6 * MB, &config));
    }

    #[test]
    fn test_effective_part_size_floor() {
        let config = TransferConfig {
            part_size: MIN_PART_SIZE,
            ..TransferConfig::default()
        };
        assert_eq!(effective_part_size(100 * MB, &config), MIN_PART_SIZE);
    }

    #[test]
    fn test_effective_part_size_grows_for_huge_objects() {
        let config = TransferConfig {
            part_size: MIN_PART_SIZE,
            ..TransferConfig::default()
        };
        // 100_000MB / 5MB parts would need 20_000 parts; the part size must
        // grow so the count stays within 10_000
        let size = 100_000 * MB;
        let part_size = effective_part_size(size, &config);
        assert!(size.div_ceil(part_size) <= MAX_PARTS);
        assert!(part_size > MIN_PART_SIZE);
    }

    #[test]
    fn test_part_count_math() {
        let config = TransferConfig::default();
        let size = 40 * MB;
        let part_size = effective_part_size(size, &config);
        let count = size.div_ceil(part_size);
        assert_eq!(count, 3);
        // Last part carries the remainder
        assert_eq!(part_size.min(size - 2 * part_size), 8 * MB);
    }

    #[tokio::test]
    async fn test_failed_complete_aborts_upload() {
        use aws_sdk_s3::config::retry::RetryConfig;
        use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
        use aws_smithy_runtime::client::http::test_util::{ReplayEvent, StaticReplayClient};
        use aws_smithy_types::body::SdkBody;
        use std::io::Write;

        const CREATED: &str = "<InitiateMultipartUploadResult>\
            <Bucket>test-bucket</Bucket><Key>big.bin</Key>\
            <UploadId>upload-1</UploadId></InitiateMultipartUploadResult>";
        const FAILED: &str = "<Error><Code>InternalError</Code>\
            <Message>upstream unavailable</Message></Error>";

        fn event(status: u16, etag: Option<&str>, body: &'static str) -> ReplayEvent {
            let mut response = http::Response::builder().status(status);
            if let Some(etag) = etag {
                response = response.header("ETag", etag);
            }
            ReplayEvent::new(
                http::Request::builder()
                    .uri("https://storage.example.com/")
                    .body(SdkBody::empty())
                    .unwrap(),
                response.body(SdkBody::from(body)).unwrap(),
            )
        }

        // create, two parts, failing complete, abort
        let http_client = StaticReplayClient::new(vec![
            event(200, None, CREATED),
            event(200, Some("\"etag-1\""), ""),
            event(200, Some("\"etag-2\""), ""),
            event(500, None, FAILED),
            event(204, None, ""),
        ]);

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url("https://storage.example.com")
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("AKIDEXAMPLE", "secret", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .http_client(http_client.clone())
            .build();
        let client = StorageClient::for_tests(
            aws_sdk_s3::Client::from_conf(sdk_config),
            "test-bucket".to_string(),
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![0u8; 6 * MB as usize]).unwrap();
        file.flush().unwrap();

        let manager = TransferManager::new(
            &client,
            TransferConfig {
                multipart_threshold: 6 * MB,
                part_size: MIN_PART_SIZE,
                max_concurrency: 2,
            },
        );

        let result = manager
            .upload_file(file.path(), "big.bin", "application/octet-stream", None)
            .await;

        match result {
            Err(Error::TransferAborted { upload_id, .. }) => assert_eq!(upload_id, "upload-1"),
            other => panic!("expected TransferAborted, got {:?}", other),
        }

        // The only DELETE in this flow is AbortMultipartUpload
        let aborts = http_client
            .actual_requests()
            .filter(|r| r.method() == "DELETE")
            .count();
        assert_eq!(aborts, 1);
    }

    #[test]
    fn test_config_from_settings_clamps() {
        let settings = TransferSettings {
            multipart_threshold_mb: 8,
            part_size_mb: 1,
            max_concurrency: 0,
            max_retries: 3,
        };
        let config = TransferConfig::from(&settings);
        assert_eq!(config.part_size, MIN_PART_SIZE);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.multipart_threshold, 8 * MB);
    }
}
