/// Data models for vod-service
///
/// This module defines structures for:
/// - VideoAsset: persisted metadata of an ingested source video
/// - TranscodingJobEvent: per-quality job dispatch on the event bus
/// - VideoUploadedEvent: informational upload notification
/// - Response DTOs for the status and delivery surfaces
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use video_core::QualityRecord;

// ========================================
// Video Asset Models
// ========================================

/// Video asset database entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VideoAsset {
    pub id: Uuid,
    pub original_file_name: String,
    pub object_key: String,
    pub owner_id: Uuid,
    pub content_type: String,
    pub size_bytes: i64,
    pub bucket: String,
    pub thumbnail_object_key: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a video asset
#[derive(Debug, Clone)]
pub struct NewVideoAsset {
    pub original_file_name: String,
    pub object_key: String,
    pub owner_id: Uuid,
    pub content_type: String,
    pub size_bytes: i64,
    pub bucket: String,
    pub thumbnail_object_key: Option<String>,
}

/// Video asset response DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAssetResponse {
    pub id: String,
    pub original_file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub thumbnail_path: Option<String>,
    pub status: String,
    pub created_at: i64,
}

impl From<VideoAsset> for VideoAssetResponse {
    fn from(asset: VideoAsset) -> Self {
        let thumbnail_path = asset
            .thumbnail_object_key
            .as_ref()
            .map(|_| format!("/api/v1/videos/{}/thumbnail", asset.id));
        Self {
            id: asset.id.to_string(),
            original_file_name: asset.original_file_name,
            content_type: asset.content_type,
            size_bytes: asset.size_bytes,
            thumbnail_path,
            status: asset.status,
            created_at: asset.created_at.timestamp(),
        }
    }
}

// ========================================
// Event Models
// ========================================

/// Per-quality transcoding job dispatched on the event bus.
///
/// `quality` unset means "produce the full multi-bitrate ladder".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodingJobEvent {
    pub video_id: Uuid,
    pub original_object_key: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl TranscodingJobEvent {
    /// Message key: jobs for one video are deliberately NOT co-located,
    /// each (video, quality) pair partitions independently.
    pub fn partition_key(&self) -> String {
        match &self.quality {
            Some(quality) => format!("{}-{}", self.video_id, quality),
            None => self.video_id.to_string(),
        }
    }
}

/// Informational notification published once per successful ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoUploadedEvent {
    pub id: Uuid,
    pub object_key: String,
    pub bucket: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

// ========================================
// Response DTOs
// ========================================

/// Response for an accepted upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAccepted {
    pub video_id: String,
    pub upload_id: String,
}

/// One completed quality with a ready-to-use download path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityResponse {
    pub quality: String,
    pub resolution: Option<String>,
    pub bitrate: Option<String>,
    pub size_bytes: i64,
    pub status: String,
    pub created_at: i64,
    pub download_path: String,
}

impl QualityResponse {
    pub fn from_record(record: QualityRecord) -> Self {
        let download_path = format!("/api/v1/videos/{}/manifest.mpd", record.video_id);
        Self {
            quality: record.quality,
            resolution: record.resolution,
            bitrate: record.bitrate,
            size_bytes: record.size_bytes,
            status: record.status,
            created_at: record.created_at.timestamp(),
            download_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_per_quality() {
        let video_id = Uuid::new_v4();
        let event = TranscodingJobEvent {
            video_id,
            original_object_key: "clip.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            quality: Some("720p".to_string()),
        };
        assert_eq!(event.partition_key(), format!("{}-720p", video_id));
    }

    #[test]
    fn test_partition_key_full_ladder() {
        let video_id = Uuid::new_v4();
        let event = TranscodingJobEvent {
            video_id,
            original_object_key: "clip.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            quality: None,
        };
        assert_eq!(event.partition_key(), video_id.to_string());
    }

    #[test]
    fn test_job_event_round_trip() {
        let event = TranscodingJobEvent {
            video_id: Uuid::new_v4(),
            original_object_key: "abc.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            quality: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: TranscodingJobEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.video_id, event.video_id);
        assert_eq!(parsed.quality, None);
    }
}
