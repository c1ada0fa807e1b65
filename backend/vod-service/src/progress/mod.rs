//! In-memory upload progress tracking
//!
//! Sessions live only in this process and are lost on restart; polling
//! clients must treat a missing session as "expired or never existed".
//! The map is the one piece of state mutated by more than one actor at a
//! time (the ingesting task writes, pollers read), so every mutation goes
//! through the map's per-entry locking.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Retention for completed sessions before eviction
pub const COMPLETED_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Retention for failed sessions before eviction
pub const FAILED_RETENTION: Duration = Duration::from_secs(30 * 60);

/// Sessions untouched for this long are removed by the sweeper regardless
/// of phase (safety net against crashed in-flight uploads)
pub const STALE_AFTER: Duration = Duration::from_secs(2 * 60 * 60);

/// Sweep period
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Upload state machine phase.
///
/// The post-upload and post-thumbnail steps are distinct values on purpose:
/// collapsing them into one generic "processing" label would make the state
/// machine unobservable from the polling surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadPhase {
    Uploading,
    Thumbnail,
    Processing,
    Transcoding,
    Completed,
    Failed,
}

impl UploadPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "UPLOADING",
            Self::Thumbnail => "THUMBNAIL",
            Self::Processing => "PROCESSING",
            Self::Transcoding => "TRANSCODING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One tracked upload session
#[derive(Debug, Clone, Serialize)]
pub struct UploadSession {
    pub upload_id: String,
    pub file_name: String,
    pub total_bytes: u64,
    pub uploaded_bytes: u64,
    pub percentage: u8,
    pub phase: UploadPhase,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub result_video_id: Option<Uuid>,
}

impl UploadSession {
    fn new(upload_id: &str, file_name: &str, total_bytes: u64) -> Self {
        let now = Utc::now();
        Self {
            upload_id: upload_id.to_string(),
            file_name: file_name.to_string(),
            total_bytes,
            uploaded_bytes: 0,
            percentage: 0,
            phase: UploadPhase::Uploading,
            message: "Upload started".to_string(),
            started_at: now,
            last_updated_at: now,
            result_video_id: None,
        }
    }
}

/// Thread-safe store of upload sessions with time-based eviction
pub struct ProgressTracker {
    sessions: DashMap<String, UploadSession>,
    completed_retention: Duration,
    failed_retention: Duration,
    stale_after: Duration,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::with_retention(COMPLETED_RETENTION, FAILED_RETENTION, STALE_AFTER)
    }

    pub fn with_retention(
        completed_retention: Duration,
        failed_retention: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            completed_retention,
            failed_retention,
            stale_after,
        }
    }

    /// Register a new session in phase `Uploading`
    pub fn create(&self, upload_id: &str, file_name: &str, total_bytes: u64) -> UploadSession {
        let session = UploadSession::new(upload_id, file_name, total_bytes);
        self.sessions.insert(upload_id.to_string(), session.clone());
        session
    }

    /// `None` means "session expired or never existed", not an error
    pub fn get(&self, upload_id: &str) -> Option<UploadSession> {
        self.sessions.get(upload_id).map(|entry| entry.clone())
    }

    /// Advance the byte counter by one read's worth and recompute the
    /// derived percentage. Called on the same call stack as the read.
    pub fn advance_bytes(&self, upload_id: &str, bytes_read: u64) {
        if let Some(mut entry) = self.sessions.get_mut(upload_id) {
            entry.uploaded_bytes = entry.uploaded_bytes.saturating_add(bytes_read);
            entry.percentage = if entry.total_bytes > 0 {
                ((entry.uploaded_bytes * 100) / entry.total_bytes).min(100) as u8
            } else {
                0
            };
            entry.message = if entry.percentage >= 100 {
                "Upload complete, processing video...".to_string()
            } else {
                format!(
                    "Uploading... {}% ({}/{} bytes)",
                    entry.percentage, entry.uploaded_bytes, entry.total_bytes
                )
            };
            entry.last_updated_at = Utc::now();
        }
    }

    pub fn set_phase(&self, upload_id: &str, phase: UploadPhase, message: &str) {
        if let Some(mut entry) = self.sessions.get_mut(upload_id) {
            entry.phase = phase;
            entry.message = message.to_string();
            entry.last_updated_at = Utc::now();
        }
    }

    /// Terminal success; the session is retained for one hour
    pub fn complete(self: &Arc<Self>, upload_id: &str, video_id: Uuid) {
        if let Some(mut entry) = self.sessions.get_mut(upload_id) {
            entry.phase = UploadPhase::Completed;
            entry.message = "Video upload completed successfully".to_string();
            entry.percentage = 100;
            entry.result_video_id = Some(video_id);
            entry.last_updated_at = Utc::now();
        }
        self.schedule_eviction(upload_id, self.completed_retention);
    }

    /// Terminal failure; the session is retained for thirty minutes
    pub fn fail(self: &Arc<Self>, upload_id: &str, error_message: &str) {
        if let Some(mut entry) = self.sessions.get_mut(upload_id) {
            entry.phase = UploadPhase::Failed;
            entry.message = format!("Upload failed: {}", error_message);
            entry.last_updated_at = Utc::now();
        }
        self.schedule_eviction(upload_id, self.failed_retention);
    }

    pub fn remove(&self, upload_id: &str) {
        self.sessions.remove(upload_id);
    }

    fn schedule_eviction(self: &Arc<Self>, upload_id: &str, after: Duration) {
        let tracker = Arc::clone(self);
        let upload_id = upload_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            tracker.sessions.remove(&upload_id);
            debug!(upload_id = %upload_id, "evicted upload session");
        });
    }

    /// Remove sessions untouched for longer than the staleness window.
    /// Returns the number of removed sessions.
    pub fn sweep(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.stale_after).unwrap_or(chrono::Duration::hours(2));
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.last_updated_at > cutoff);
        before.saturating_sub(self.sessions.len())
    }

    /// Spawn the periodic sweeper task
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await; // the first tick fires immediately
            loop {
                interval.tick().await;
                let removed = tracker.sweep();
                if removed > 0 {
                    info!(removed, "swept stale upload sessions");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_accounting_reaches_full_percentage() {
        let tracker = ProgressTracker::new();
        tracker.create("u1", "clip.mp4", 1000);

        tracker.advance_bytes("u1", 400);
        let session = tracker.get("u1").unwrap();
        assert_eq!(session.uploaded_bytes, 400);
        assert_eq!(session.percentage, 40);
        assert_eq!(session.phase, UploadPhase::Uploading);

        tracker.advance_bytes("u1", 600);
        let session = tracker.get("u1").unwrap();
        assert_eq!(session.uploaded_bytes, 1000);
        assert_eq!(session.percentage, 100);
        // percentage hits 100 while still in the uploading phase; the
        // coordinator advances the phase afterwards
        assert_eq!(session.phase, UploadPhase::Uploading);
    }

    #[test]
    fn test_percentage_is_floored() {
        let tracker = ProgressTracker::new();
        tracker.create("u1", "clip.mp4", 3);
        tracker.advance_bytes("u1", 1);
        assert_eq!(tracker.get("u1").unwrap().percentage, 33);
    }

    #[test]
    fn test_get_unknown_id_is_none() {
        let tracker = ProgressTracker::new();
        assert!(tracker.get("missing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_session_evicted_after_retention() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.create("u1", "clip.mp4", 10);
        tracker.complete("u1", Uuid::new_v4());

        let session = tracker.get("u1").unwrap();
        assert_eq!(session.phase, UploadPhase::Completed);
        assert!(session.result_video_id.is_some());

        tokio::time::sleep(COMPLETED_RETENTION + Duration::from_secs(1)).await;
        assert!(tracker.get("u1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_session_evicted_sooner() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.create("u1", "clip.mp4", 10);
        tracker.fail("u1", "storage unreachable");

        let session = tracker.get("u1").unwrap();
        assert_eq!(session.phase, UploadPhase::Failed);
        assert!(session.message.contains("storage unreachable"));

        tokio::time::sleep(FAILED_RETENTION + Duration::from_secs(1)).await;
        assert!(tracker.get("u1").is_none());
    }

    #[test]
    fn test_sweep_removes_stale_sessions() {
        let tracker =
            ProgressTracker::with_retention(COMPLETED_RETENTION, FAILED_RETENTION, Duration::ZERO);
        tracker.create("u1", "clip.mp4", 10);
        tracker.create("u2", "other.mp4", 10);
        assert_eq!(tracker.sweep(), 2);
        assert!(tracker.get("u1").is_none());
    }

    #[test]
    fn test_failed_reachable_from_any_phase() {
        let tracker = ProgressTracker::new();
        tracker.create("u1", "clip.mp4", 10);
        tracker.set_phase("u1", UploadPhase::Transcoding, "Dispatching jobs...");
        assert!(!tracker.get("u1").unwrap().phase.is_terminal());
        tracker.set_phase("u1", UploadPhase::Failed, "boom");
        assert!(tracker.get("u1").unwrap().phase.is_terminal());
    }
}
