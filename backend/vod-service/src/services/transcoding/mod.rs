//! Transcoding orchestration
//!
//! Consumes transcoding job events: downloads the source object, drives the
//! encoder to produce a segmented DASH package for one quality or the whole
//! ladder, uploads the outputs, and records completion through the quality
//! record store. Job failure is terminal for the event — the bus's own
//! redelivery policy is the only retry mechanism, and a quality that fails
//! never gets a record.

pub mod encoder;

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use video_core::constants::{CONTENT_TYPE_MANIFEST, CONTENT_TYPE_SEGMENT, DASH_MANIFEST_NAME};
use video_core::{NewQualityRecord, VideoQuality};

use crate::config::TranscodeConfig;
use crate::db::QualityRecordStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::TranscodingJobEvent;
use crate::storage::ObjectStorage;

use encoder::{remove_tree_logged, EncodeRunner, QualityPlan};

/// Everything before the first dot of the object key; DASH artifacts live
/// under `{base}/dash/`
pub fn base_key(object_key: &str) -> &str {
    object_key.split('.').next().unwrap_or(object_key)
}

/// Storage key of the DASH manifest for a source object
pub fn manifest_key(object_key: &str) -> String {
    format!("{}/dash/{}", base_key(object_key), DASH_MANIFEST_NAME)
}

/// Content type of one DASH artifact by file name
pub fn artifact_content_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".mpd") {
        CONTENT_TYPE_MANIFEST
    } else if file_name.ends_with(".m4s") {
        CONTENT_TYPE_SEGMENT
    } else {
        "application/octet-stream"
    }
}

/// Orchestrates one transcoding job at a time; instances are shared across
/// worker tasks, one in-flight event per task
pub struct TranscodingService {
    storage: Arc<ObjectStorage>,
    quality_store: QualityRecordStore,
    runner: EncodeRunner,
}

impl TranscodingService {
    pub fn new(
        storage: Arc<ObjectStorage>,
        quality_store: QualityRecordStore,
        config: &TranscodeConfig,
    ) -> Self {
        Self {
            storage,
            quality_store,
            runner: EncodeRunner::new(config),
        }
    }

    /// Process one job event to completion or terminal failure
    pub async fn process_event(&self, event: TranscodingJobEvent) -> Result<()> {
        metrics::TRANSCODE_JOBS_STARTED.inc();
        info!(
            video_id = %event.video_id,
            object_key = %event.original_object_key,
            quality = event.quality.as_deref().unwrap_or("ladder"),
            "starting transcoding job"
        );

        let plan = match event.quality.as_deref() {
            Some(label) => {
                let quality = VideoQuality::from_label(label).ok_or_else(|| {
                    AppError::Validation(format!("unknown quality: {}", label))
                })?;
                QualityPlan::Single(quality)
            }
            None => QualityPlan::Ladder(VideoQuality::ladder().to_vec()),
        };

        match self.run_job(&event, &plan).await {
            Ok(()) => {
                metrics::TRANSCODE_JOBS_COMPLETED.inc();
                info!(video_id = %event.video_id, "transcoding job completed");
                Ok(())
            }
            Err(err) => {
                metrics::TRANSCODE_JOBS_FAILED.inc();
                error!(
                    video_id = %event.video_id,
                    quality = event.quality.as_deref().unwrap_or("ladder"),
                    error = %err,
                    "transcoding job failed, no quality record written"
                );
                Err(err)
            }
        }
    }

    async fn run_job(&self, event: &TranscodingJobEvent, plan: &QualityPlan) -> Result<()> {
        let workdir = tempfile::Builder::new()
            .prefix("transcode-")
            .tempdir()
            .map_err(|e| AppError::Internal(format!("failed to create temp dir: {e}")))?
            .into_path();

        let result = self.run_job_inner(event, plan, &workdir).await;

        // every exit path removes the job's temp tree
        remove_tree_logged(&workdir);

        result
    }

    async fn run_job_inner(
        &self,
        event: &TranscodingJobEvent,
        plan: &QualityPlan,
        workdir: &Path,
    ) -> Result<()> {
        let input_path = workdir.join(input_file_name(&event.original_object_key));
        let source_bytes = self
            .storage
            .get_to_file(
                self.storage.originals_bucket(),
                &event.original_object_key,
                &input_path,
            )
            .await?;
        info!(
            video_id = %event.video_id,
            bytes = source_bytes,
            "downloaded source object"
        );

        let bucket = match plan {
            QualityPlan::Single(quality) => self.storage.bucket_for_quality(quality.label()),
            QualityPlan::Ladder(_) => self.storage.originals_bucket(),
        }
        .to_string();

        // passthrough-only plans have nothing to encode; the source object
        // already is the artifact
        if !plan.encoded().is_empty() {
            let output_dir = workdir.join("dash");
            tokio::fs::create_dir_all(&output_dir)
                .await
                .map_err(|e| AppError::Internal(format!("failed to create output dir: {e}")))?;

            self.runner
                .run(&input_path, &output_dir, plan)
                .await
                .map_err(AppError::Encode)?;

            self.upload_outputs(&output_dir, &event.original_object_key, &bucket)
                .await?;
        }

        self.record_qualities(event, plan, &bucket, source_bytes as i64)
            .await;

        Ok(())
    }

    /// Upload every produced file under `{base}/dash/`
    async fn upload_outputs(
        &self,
        output_dir: &Path,
        original_object_key: &str,
        bucket: &str,
    ) -> Result<()> {
        let base = base_key(original_object_key);

        let mut entries = tokio::fs::read_dir(output_dir)
            .await
            .map_err(|e| AppError::Internal(format!("failed to read output dir: {e}")))?;

        let mut uploaded = 0usize;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Internal(format!("failed to read output dir: {e}")))?
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let key = format!("{base}/dash/{file_name}");
            self.storage
                .put_file(bucket, &key, &path, artifact_content_type(&file_name))
                .await?;
            uploaded += 1;
        }

        info!(bucket = %bucket, base = %base, files = uploaded, "uploaded DASH package");
        Ok(())
    }

    /// Record one completed quality per tier. A record that cannot be saved
    /// after retries is abandoned — it does not fail the job that produced
    /// the artifacts.
    async fn record_qualities(
        &self,
        event: &TranscodingJobEvent,
        plan: &QualityPlan,
        bucket: &str,
        source_bytes: i64,
    ) {
        let manifest = manifest_key(&event.original_object_key);

        let mut records: Vec<NewQualityRecord> = plan
            .encoded()
            .into_iter()
            .map(|quality| {
                NewQualityRecord::completed_manifest(
                    event.video_id,
                    quality,
                    manifest.clone(),
                    bucket.to_string(),
                )
            })
            .collect();

        // full-ladder and passthrough jobs also record the original
        let records_original = matches!(plan, QualityPlan::Ladder(_))
            || matches!(plan, QualityPlan::Single(VideoQuality::Original));
        if records_original {
            records.push(NewQualityRecord::completed_original(
                event.video_id,
                event.original_object_key.clone(),
                source_bytes,
                event.content_type.clone(),
                self.storage.originals_bucket().to_string(),
            ));
        }

        for record in records {
            let quality = record.quality.clone();
            if let Err(err) = self.quality_store.save(record).await {
                error!(
                    video_id = %event.video_id,
                    quality = %quality,
                    error = %err,
                    "abandoning quality record after retry exhaustion"
                );
            }
        }
    }
}

/// Local file name for the downloaded source, preserving the extension
fn input_file_name(object_key: &str) -> String {
    let extension = Path::new(object_key)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    format!("input.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_key_strips_extension() {
        assert_eq!(base_key("abc-123.mp4"), "abc-123");
        assert_eq!(base_key("no-extension"), "no-extension");
    }

    #[test]
    fn test_manifest_key_layout() {
        assert_eq!(manifest_key("abc.mp4"), "abc/dash/manifest.mpd");
    }

    #[test]
    fn test_artifact_content_types() {
        assert_eq!(artifact_content_type("manifest.mpd"), "application/dash+xml");
        assert_eq!(artifact_content_type("chunk-0-3.m4s"), "video/iso.segment");
        assert_eq!(
            artifact_content_type("readme.txt"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_input_file_name_preserves_extension() {
        assert_eq!(input_file_name("abc.webm"), "input.webm");
        assert_eq!(input_file_name("abc"), "input.mp4");
    }
}
