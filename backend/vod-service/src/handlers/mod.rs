//! HTTP handlers for the status and delivery surfaces

pub mod uploads;
pub mod videos;

pub use uploads::{get_progress, stream_progress};
pub use videos::{
    get_manifest, get_segment, get_thumbnail, list_qualities, list_videos, upload_video,
};
