//! Core video data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::CONTENT_TYPE_MANIFEST;

/// Target quality tier produced from one source video.
///
/// `Original` is a passthrough tier: the source object itself is the
/// artifact and it is never sent to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoQuality {
    Original,
    Q1080p,
    Q720p,
    Q480p,
    Q360p,
}

impl VideoQuality {
    /// Human-readable label used in event keys, records, and bucket names
    pub fn label(&self) -> &'static str {
        match self {
            Self::Original => "ORIGINAL",
            Self::Q1080p => "1080p",
            Self::Q720p => "720p",
            Self::Q480p => "480p",
            Self::Q360p => "360p",
        }
    }

    /// Target resolution as `WIDTHxHEIGHT`, `None` for passthrough
    pub fn resolution(&self) -> Option<&'static str> {
        match self {
            Self::Original => None,
            Self::Q1080p => Some("1920x1080"),
            Self::Q720p => Some("1280x720"),
            Self::Q480p => Some("854x480"),
            Self::Q360p => Some("640x360"),
        }
    }

    /// Target video bitrate in ffmpeg notation, `None` for passthrough
    pub fn bitrate(&self) -> Option<&'static str> {
        match self {
            Self::Original => None,
            Self::Q1080p => Some("5000k"),
            Self::Q720p => Some("3000k"),
            Self::Q480p => Some("1500k"),
            Self::Q360p => Some("800k"),
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "original" => Some(Self::Original),
            "1080p" => Some(Self::Q1080p),
            "720p" => Some(Self::Q720p),
            "480p" => Some(Self::Q480p),
            "360p" => Some(Self::Q360p),
            _ => None,
        }
    }

    /// The encoded quality ladder, highest tier first
    pub fn ladder() -> [VideoQuality; 4] {
        [Self::Q1080p, Self::Q720p, Self::Q480p, Self::Q360p]
    }
}

/// Quality record lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityRecordStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QualityRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Per-quality artifact record.
///
/// Rows are append-only: a given (video_id, quality) pair may have zero, one,
/// or more rows, and callers resolve current state by taking the most recent.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QualityRecord {
    pub id: Uuid,
    pub video_id: Uuid,
    pub quality: String,
    pub resolution: Option<String>,
    pub bitrate: Option<String>,
    pub object_key: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub bucket_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl QualityRecord {
    pub fn get_status(&self) -> QualityRecordStatus {
        QualityRecordStatus::from_str(&self.status).unwrap_or(QualityRecordStatus::Pending)
    }
}

/// Insert payload for a quality record (id and timestamp are generated)
#[derive(Debug, Clone)]
pub struct NewQualityRecord {
    pub video_id: Uuid,
    pub quality: String,
    pub resolution: Option<String>,
    pub bitrate: Option<String>,
    pub object_key: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub bucket_name: String,
    pub status: QualityRecordStatus,
}

impl NewQualityRecord {
    /// Record for a completed encoded tier, pointing at the shared manifest
    pub fn completed_manifest(
        video_id: Uuid,
        quality: VideoQuality,
        manifest_key: String,
        bucket_name: String,
    ) -> Self {
        Self {
            video_id,
            quality: quality.label().to_string(),
            resolution: quality.resolution().map(str::to_string),
            bitrate: quality.bitrate().map(str::to_string),
            object_key: manifest_key,
            size_bytes: 0,
            content_type: CONTENT_TYPE_MANIFEST.to_string(),
            bucket_name,
            status: QualityRecordStatus::Completed,
        }
    }

    /// Passthrough record for the original source object
    pub fn completed_original(
        video_id: Uuid,
        object_key: String,
        size_bytes: i64,
        content_type: String,
        bucket_name: String,
    ) -> Self {
        Self {
            video_id,
            quality: VideoQuality::Original.label().to_string(),
            resolution: None,
            bitrate: None,
            object_key,
            size_bytes,
            content_type,
            bucket_name,
            status: QualityRecordStatus::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_order_and_bitrates() {
        let ladder = VideoQuality::ladder();
        assert_eq!(ladder[0].label(), "1080p");
        assert_eq!(ladder[0].resolution(), Some("1920x1080"));
        assert_eq!(ladder[0].bitrate(), Some("5000k"));
        assert_eq!(ladder[3].label(), "360p");
        assert_eq!(ladder[3].resolution(), Some("640x360"));
        assert_eq!(ladder[3].bitrate(), Some("800k"));
    }

    #[test]
    fn test_from_label_is_case_insensitive() {
        assert_eq!(VideoQuality::from_label("720P"), Some(VideoQuality::Q720p));
        assert_eq!(
            VideoQuality::from_label("original"),
            Some(VideoQuality::Original)
        );
        assert_eq!(VideoQuality::from_label("4k"), None);
    }

    #[test]
    fn test_original_is_passthrough() {
        assert_eq!(VideoQuality::Original.resolution(), None);
        assert_eq!(VideoQuality::Original.bitrate(), None);
    }

    #[test]
    fn test_completed_manifest_record() {
        let video_id = Uuid::new_v4();
        let record = NewQualityRecord::completed_manifest(
            video_id,
            VideoQuality::Q720p,
            "abc/dash/manifest.mpd".to_string(),
            "vod-q720p".to_string(),
        );
        assert_eq!(record.quality, "720p");
        assert_eq!(record.resolution.as_deref(), Some("1280x720"));
        assert_eq!(record.content_type, "application/dash+xml");
        assert_eq!(record.status, QualityRecordStatus::Completed);
    }
}
