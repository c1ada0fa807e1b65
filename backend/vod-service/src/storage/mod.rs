/// Object storage client for the VOD pipeline
///
/// Thin adapter over the S3 API (S3-compatible stores supported through the
/// configurable endpoint). Buckets: one for originals (thumbnails live under
/// a `thumbnails/` prefix inside it) and one per quality tier, resolved
/// through the configured mapping with the originals bucket as fallback.
use std::path::Path;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};

/// Initialize the S3 client with credentials from config
pub async fn get_client(config: &StorageConfig) -> Result<Client> {
    use aws_sdk_s3::config::Region;

    let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    // Use the default credential chain unless explicit credentials are provided
    if let (Some(access_key_id), Some(secret_access_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        use aws_sdk_s3::config::Credentials;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "vod_service_storage",
        );
        aws_config_builder = aws_config_builder.credentials_provider(credentials);
    }

    // Custom endpoint for S3-compatible storage (e.g. MinIO)
    if let Some(endpoint) = &config.endpoint {
        aws_config_builder = aws_config_builder.endpoint_url(endpoint);
    }

    let aws_config = aws_config_builder.load().await;
    Ok(Client::new(&aws_config))
}

/// Object storage operations used by the pipeline
pub struct ObjectStorage {
    client: Client,
    config: StorageConfig,
}

impl ObjectStorage {
    pub fn new(client: Client, config: StorageConfig) -> Self {
        Self { client, config }
    }

    /// Bucket holding original uploads and thumbnails
    pub fn originals_bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Bucket for a given quality tier, falling back to the originals bucket
    pub fn bucket_for_quality(&self, quality: &str) -> &str {
        self.config.bucket_for_quality(quality)
    }

    /// Upload a local file
    pub async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<()> {
        let body = ByteStream::from_path(path).await.map_err(|e| {
            AppError::Storage(format!("failed to read {}: {}", path.display(), e))
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| map_put_error(bucket, e))?;

        Ok(())
    }

    /// Download an object to a local file, returning the byte count
    pub async fn get_to_file(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_get_error(key, e))?;

        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            AppError::Storage(format!("failed to create {}: {}", dest.display(), e))
        })?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .body
            .try_next()
            .await
            .map_err(|e| AppError::Storage(format!("failed to read object body: {}", e)))?
        {
            written += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|e| {
                AppError::Storage(format!("failed to write {}: {}", dest.display(), e))
            })?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::Storage(format!("failed to flush {}: {}", dest.display(), e)))?;

        Ok(written)
    }

    /// Download an object into memory
    pub async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_get_error(key, e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("failed to read object body: {}", e)))?;

        Ok(data.into_bytes())
    }

    /// Health check for storage connectivity and bucket access
    pub async fn health_check(&self) -> Result<()> {
        match self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .max_keys(1)
            .send()
            .await
        {
            Ok(_) => {
                tracing::info!(
                    bucket = %self.config.bucket,
                    region = %self.config.region,
                    "storage connection validated"
                );
                Ok(())
            }
            Err(e) => Err(AppError::Storage(format!(
                "storage health check failed for bucket {}: {}",
                self.config.bucket, e
            ))),
        }
    }
}

fn map_put_error<E: std::fmt::Display>(bucket: &str, err: E) -> AppError {
    let message = err.to_string();
    if message.contains("403") || message.contains("Forbidden") {
        AppError::Storage("storage auth failed (403): check credentials".to_string())
    } else if message.contains("NoSuchBucket") {
        AppError::Storage(format!("bucket not found: {}", bucket))
    } else {
        AppError::Storage(format!("storage upload failed: {}", message))
    }
}

fn map_get_error<E: std::fmt::Display>(key: &str, err: E) -> AppError {
    let message = err.to_string();
    if message.contains("NoSuchKey") || message.contains("404") || message.contains("NotFound") {
        AppError::NotFound(format!("object not found: {}", key))
    } else {
        AppError::Storage(format!("storage download failed: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_error_maps_missing_key_to_not_found() {
        let err = map_get_error("abc.mp4", "service error: NoSuchKey");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_get_error_maps_other_failures_to_storage() {
        let err = map_get_error("abc.mp4", "connection refused");
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[test]
    fn test_put_error_maps_missing_bucket() {
        let err = map_put_error("vod-q720p", "NoSuchBucket");
        match err {
            AppError::Storage(msg) => assert!(msg.contains("vod-q720p")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
