//! Upload ingestion pipeline
//!
//! Runs to completion on the caller's task: validates input, spools the
//! byte stream while advancing the progress session on the same call stack
//! as each read, writes the original to object storage, extracts a
//! thumbnail, persists the asset record, and fans out one transcoding job
//! per quality tier.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use sqlx::PgPool;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use video_core::constants::{THUMBNAIL_MAX_OFFSET_SECS, THUMBNAIL_TIMEOUT_SECS};
use video_core::VideoQuality;

use crate::config::TranscodeConfig;
use crate::db::video_repo;
use crate::error::{AppError, Result};
use crate::kafka::PipelineEventsProducer;
use crate::metrics;
use crate::models::{NewVideoAsset, TranscodingJobEvent, VideoUploadedEvent};
use crate::progress::{ProgressTracker, UploadPhase};
use crate::services::transcoding::encoder::run_command;
use crate::storage::ObjectStorage;

/// Metadata accompanying the upload byte stream
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub file_name: Option<String>,
    pub content_type: String,
    pub total_bytes: u64,
}

/// Result of a successful ingestion
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub video_id: Uuid,
    pub upload_id: String,
}

pub struct UploadCoordinator {
    pool: PgPool,
    storage: Arc<ObjectStorage>,
    producer: PipelineEventsProducer,
    progress: Arc<ProgressTracker>,
    transcode: TranscodeConfig,
}

impl UploadCoordinator {
    pub fn new(
        pool: PgPool,
        storage: Arc<ObjectStorage>,
        producer: PipelineEventsProducer,
        progress: Arc<ProgressTracker>,
        transcode: TranscodeConfig,
    ) -> Self {
        Self {
            pool,
            storage,
            producer,
            progress,
            transcode,
        }
    }

    /// Ingest one upload. Any unrecoverable failure marks the session
    /// `FAILED` with the error message and propagates to the caller.
    pub async fn ingest<S, E>(
        &self,
        stream: S,
        meta: UploadMeta,
        owner_id: Uuid,
    ) -> Result<IngestOutcome>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        if meta.total_bytes == 0 {
            return Err(AppError::Validation(
                "video file must not be empty".to_string(),
            ));
        }

        let upload_id = Uuid::new_v4().to_string();
        let file_name = effective_file_name(meta.file_name.as_deref());

        // the session exists before any byte is transferred
        self.progress.create(&upload_id, &file_name, meta.total_bytes);

        match self
            .ingest_inner(stream, &meta, &upload_id, &file_name, owner_id)
            .await
        {
            Ok(video_id) => {
                self.progress.complete(&upload_id, video_id);
                metrics::UPLOADS_COMPLETED.inc();
                info!(%video_id, upload_id = %upload_id, "upload completed");
                Ok(IngestOutcome {
                    video_id,
                    upload_id,
                })
            }
            Err(err) => {
                self.progress.fail(&upload_id, &err.to_string());
                metrics::UPLOADS_FAILED.inc();
                Err(err)
            }
        }
    }

    async fn ingest_inner<S, E>(
        &self,
        mut stream: S,
        meta: &UploadMeta,
        upload_id: &str,
        file_name: &str,
        owner_id: Uuid,
    ) -> Result<Uuid>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let object_key = build_object_key(file_name);

        self.progress.set_phase(
            upload_id,
            UploadPhase::Uploading,
            "Uploading video to storage...",
        );

        // spool to a local temp file; each chunk advances the session on
        // this call stack, so progress tracks the network read exactly
        let spool = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".tmp")
            .tempfile()
            .map_err(|e| AppError::Internal(format!("failed to create spool file: {e}")))?;
        let spool_path = spool.into_temp_path();

        let mut file = tokio::fs::File::create(&spool_path)
            .await
            .map_err(|e| AppError::Internal(format!("failed to open spool file: {e}")))?;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::Storage(format!("failed to read upload stream: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::Storage(format!("failed to spool upload: {e}")))?;
            self.progress.advance_bytes(upload_id, chunk.len() as u64);
        }
        file.flush()
            .await
            .map_err(|e| AppError::Storage(format!("failed to spool upload: {e}")))?;
        drop(file);

        self.storage
            .put_file(
                self.storage.originals_bucket(),
                &object_key,
                &spool_path,
                &meta.content_type,
            )
            .await?;

        self.progress.set_phase(
            upload_id,
            UploadPhase::Thumbnail,
            "Extracting video thumbnail...",
        );
        let thumbnail_object_key = self
            .extract_and_upload_thumbnail(&spool_path, &object_key)
            .await;

        self.progress.set_phase(
            upload_id,
            UploadPhase::Processing,
            "Saving video metadata...",
        );
        let asset = video_repo::insert_asset(
            &self.pool,
            NewVideoAsset {
                original_file_name: file_name.to_string(),
                object_key: object_key.clone(),
                owner_id,
                content_type: meta.content_type.clone(),
                size_bytes: meta.total_bytes as i64,
                bucket: self.storage.originals_bucket().to_string(),
                thumbnail_object_key,
            },
        )
        .await?;

        self.progress.set_phase(
            upload_id,
            UploadPhase::Transcoding,
            "Dispatching transcoding jobs...",
        );
        self.dispatch_transcode_jobs(&asset.id, &object_key, &meta.content_type)
            .await;

        let uploaded_event = VideoUploadedEvent {
            id: asset.id,
            object_key: asset.object_key.clone(),
            bucket: asset.bucket.clone(),
            size_bytes: asset.size_bytes,
            content_type: asset.content_type.clone(),
            uploaded_at: asset.created_at,
        };
        if let Err(err) = self.producer.publish_video_uploaded(&uploaded_event).await {
            error!(video_id = %asset.id, error = %err, "failed to publish video uploaded event");
        }

        Ok(asset.id)
    }

    /// One job event per quality in the encoded ladder. A publish failure
    /// means that quality is simply never produced; it is logged and
    /// counted, never retried, and never fails the ingestion.
    async fn dispatch_transcode_jobs(&self, video_id: &Uuid, object_key: &str, content_type: &str) {
        for quality in VideoQuality::ladder() {
            let event = TranscodingJobEvent {
                video_id: *video_id,
                original_object_key: object_key.to_string(),
                content_type: content_type.to_string(),
                quality: Some(quality.label().to_string()),
            };
            match self.producer.publish_transcode_job(&event).await {
                Ok(()) => {
                    metrics::TRANSCODE_JOBS_PUBLISHED.inc();
                    info!(
                        %video_id,
                        quality = quality.label(),
                        "dispatched transcoding job"
                    );
                }
                Err(err) => {
                    metrics::TRANSCODE_JOB_PUBLISH_FAILURES.inc();
                    error!(
                        %video_id,
                        quality = quality.label(),
                        error = %err,
                        "failed to publish transcoding job, quality will not be produced"
                    );
                }
            }
        }
    }

    /// Extract a representative still and upload it next to the original.
    /// Failure is tolerated: the asset proceeds without a thumbnail.
    async fn extract_and_upload_thumbnail(
        &self,
        video_path: &Path,
        object_key: &str,
    ) -> Option<String> {
        match self.try_extract_thumbnail(video_path, object_key).await {
            Ok(key) => {
                info!(thumbnail_key = %key, %object_key, "uploaded thumbnail");
                Some(key)
            }
            Err(err) => {
                warn!(
                    %object_key,
                    error = %err,
                    "thumbnail extraction failed, continuing without thumbnail"
                );
                None
            }
        }
    }

    async fn try_extract_thumbnail(&self, video_path: &Path, object_key: &str) -> Result<String> {
        let duration = self.probe_duration(video_path).await?;
        let capture_at = (duration * 0.1).min(THUMBNAIL_MAX_OFFSET_SECS);

        let thumb_path = video_path.with_extension("jpg");
        let args: Vec<String> = vec![
            "-y".into(),
            "-ss".into(),
            format!("{capture_at}"),
            "-i".into(),
            video_path.display().to_string(),
            "-frames:v".into(),
            "1".into(),
            "-q:v".into(),
            "2".into(),
            "-vf".into(),
            "scale=iw:-1".into(),
            thumb_path.display().to_string(),
        ];

        run_command(
            &self.transcode.ffmpeg_bin,
            &args,
            std::time::Duration::from_secs(THUMBNAIL_TIMEOUT_SECS),
            "ffmpeg[thumbnail]",
        )
        .await
        .map_err(AppError::Encode)?;

        let key = thumbnail_key(object_key);
        let upload_result = self
            .storage
            .put_file(
                self.storage.originals_bucket(),
                &key,
                &thumb_path,
                "image/jpeg",
            )
            .await;

        if let Err(err) = tokio::fs::remove_file(&thumb_path).await {
            warn!(path = %thumb_path.display(), error = %err, "failed to delete temp thumbnail");
        }

        upload_result.map(|()| key)
    }

    /// Duration in seconds, probed from the container format
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let output = tokio::process::Command::new(&self.transcode.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| AppError::Internal(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(AppError::Internal(format!(
                "ffprobe exited with code {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<f64>()
            .map_err(|e| AppError::Internal(format!("failed to parse ffprobe duration: {e}")))
    }
}

/// Substitute a synthetic name when the original is missing or blank
pub fn effective_file_name(original: Option<&str>) -> String {
    match original {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => format!("video-{}", Utc::now().timestamp_millis()),
    }
}

/// Collision-resistant object key: sanitized stem plus a random suffix,
/// original extension preserved
pub fn build_object_key(original_file_name: &str) -> String {
    let sanitized: String = original_file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let (stem, extension) = match sanitized.rfind('.') {
        Some(idx) if idx > 0 && idx < sanitized.len() - 1 => {
            (&sanitized[..idx], &sanitized[idx..])
        }
        _ => (sanitized.as_str(), ""),
    };

    let stem = stem.trim_matches('.');
    let stem = if stem.is_empty() { "video" } else { stem };

    format!("{}-{}{}", stem, Uuid::new_v4(), extension)
}

/// Thumbnails live under a prefix in the originals bucket, keyed after the
/// video object with the extension replaced
pub fn thumbnail_key(object_key: &str) -> String {
    match object_key.rfind('.') {
        Some(idx) => format!("thumbnails/{}.jpg", &object_key[..idx]),
        None => format!("thumbnails/{}.jpg", object_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_valid_key_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
    }

    #[test]
    fn test_object_key_sanitizes_and_preserves_extension() {
        let key = build_object_key("clip one.mp4");
        assert!(key.ends_with(".mp4"));
        assert!(key.starts_with("clip_one-"));
        assert!(key.chars().all(is_valid_key_char));
    }

    #[test]
    fn test_object_keys_are_unique() {
        assert_ne!(build_object_key("a.mp4"), build_object_key("a.mp4"));
    }

    #[test]
    fn test_object_key_without_extension() {
        let key = build_object_key("raw_recording");
        assert!(key.starts_with("raw_recording-"));
        assert!(!key.contains('.'));
    }

    #[test]
    fn test_object_key_degenerate_name() {
        let key = build_object_key("видео.mp4");
        assert!(key.ends_with(".mp4"));
        assert!(key.chars().all(is_valid_key_char));
    }

    #[test]
    fn test_effective_file_name_substitutes_synthetic() {
        assert_eq!(effective_file_name(Some("clip.mp4")), "clip.mp4");
        assert!(effective_file_name(None).starts_with("video-"));
        assert!(effective_file_name(Some("   ")).starts_with("video-"));
    }

    #[test]
    fn test_thumbnail_key_replaces_extension() {
        assert_eq!(thumbnail_key("abc-123.mp4"), "thumbnails/abc-123.jpg");
        assert_eq!(thumbnail_key("abc-123"), "thumbnails/abc-123.jpg");
    }
}
