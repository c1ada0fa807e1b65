//! VOD pipeline constants

/// DASH segment duration in seconds
pub const DASH_SEGMENT_DURATION_SECS: u32 = 10;

/// DASH initialization segment name template
pub const DASH_INIT_SEGMENT_TEMPLATE: &str = "init-$RepresentationID$.m4s";

/// DASH media segment name template
pub const DASH_MEDIA_SEGMENT_TEMPLATE: &str = "chunk-$RepresentationID$-$Number$.m4s";

/// DASH manifest file name
pub const DASH_MANIFEST_NAME: &str = "manifest.mpd";

/// Audio bitrate shared by every representation
pub const AUDIO_BITRATE: &str = "128k";

/// Encoder wall-clock timeout (20 minutes per job)
pub const ENCODE_TIMEOUT_SECS: u64 = 20 * 60;

/// Thumbnail extraction timeout (2 minutes)
pub const THUMBNAIL_TIMEOUT_SECS: u64 = 2 * 60;

/// Maximum thumbnail capture offset into the video (seconds)
pub const THUMBNAIL_MAX_OFFSET_SECS: f64 = 2.0;

/// Content type of a DASH manifest
pub const CONTENT_TYPE_MANIFEST: &str = "application/dash+xml";

/// Content type of a DASH media segment
pub const CONTENT_TYPE_SEGMENT: &str = "video/iso.segment";
