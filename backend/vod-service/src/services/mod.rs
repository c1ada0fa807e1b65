//! Service layer for the upload-to-delivery pipeline
//!
//! - Upload coordinator: progress-tracked ingestion and job fan-out
//! - Transcoding orchestrator: job consumption, encoding, artifact recording

pub mod transcoding;
pub mod upload;

pub use transcoding::TranscodingService;
pub use upload::{IngestOutcome, UploadCoordinator, UploadMeta};
