//! Core video pipeline types
//!
//! Shared data structures for vod-service and related systems: the quality
//! ladder, per-quality artifact records, and DASH packaging constants.

pub mod constants;
pub mod models;

pub use models::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_is_four_encoded_tiers() {
        let ladder = VideoQuality::ladder();
        assert_eq!(ladder.len(), 4);
        assert!(!ladder.contains(&VideoQuality::Original));
    }

    #[test]
    fn test_quality_record_status_round_trip() {
        let status = QualityRecordStatus::Completed;
        assert_eq!(status.as_str(), "COMPLETED");
        assert_eq!(
            QualityRecordStatus::from_str("COMPLETED"),
            Some(QualityRecordStatus::Completed)
        );
    }
}
