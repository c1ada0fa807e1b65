/// Configuration management for vod-service
///
/// Loads configuration from environment variables with sensible defaults.
use std::collections::HashMap;

use video_core::constants::ENCODE_TIMEOUT_SECS;

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub storage: StorageConfig,
    pub transcode: TranscodeConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct KafkaConfig {
    pub brokers: String,
    /// Topic for single-quality transcoding jobs
    pub transcode_topic: String,
    /// Topic for full-ladder transcoding jobs
    pub transcode_ladder_topic: String,
    /// Informational "video uploaded" notifications
    pub upload_events_topic: String,
    pub group_id: String,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Bucket holding original uploads (thumbnails live under a prefix here)
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    /// Quality label (lowercase) -> bucket; unmapped qualities fall back to `bucket`
    pub quality_buckets: HashMap<String, String>,
}

impl StorageConfig {
    pub fn bucket_for_quality(&self, quality: &str) -> &str {
        self.quality_buckets
            .get(&quality.to_ascii_lowercase())
            .map(String::as_str)
            .unwrap_or(&self.bucket)
    }
}

/// DASH command construction strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DashStrategy {
    /// N video stream copies mapped in, each with its own bitrate/scale
    MappedStreams,
    /// One filter graph splitting the decoded video into N scaled branches
    FilterGraph,
}

impl DashStrategy {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "mapped" | "mapped-streams" => Some(Self::MappedStreams),
            "filter-graph" | "filter_complex" => Some(Self::FilterGraph),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TranscodeConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub timeout_secs: u64,
    pub strategy: DashStrategy,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("VOD_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("VOD_SERVICE_PORT")
                    .unwrap_or_else(|_| "8084".to_string())
                    .parse()
                    .unwrap_or(8084),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/vod".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                transcode_topic: std::env::var("KAFKA_TRANSCODE_TOPIC")
                    .unwrap_or_else(|_| "video.transcode.jobs".to_string()),
                transcode_ladder_topic: std::env::var("KAFKA_TRANSCODE_LADDER_TOPIC")
                    .unwrap_or_else(|_| "video.transcode.ladder".to_string()),
                upload_events_topic: std::env::var("KAFKA_UPLOAD_EVENTS_TOPIC")
                    .unwrap_or_else(|_| "video.uploaded".to_string()),
                group_id: std::env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| "transcode-worker".to_string()),
            },
            storage: StorageConfig {
                bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "vod-originals".to_string()),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
                quality_buckets: parse_quality_buckets(
                    std::env::var("S3_QUALITY_BUCKETS").ok().as_deref(),
                ),
            },
            transcode: TranscodeConfig {
                ffmpeg_bin: std::env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()),
                ffprobe_bin: std::env::var("FFPROBE_BIN")
                    .unwrap_or_else(|_| "ffprobe".to_string()),
                timeout_secs: std::env::var("TRANSCODE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(ENCODE_TIMEOUT_SECS),
                strategy: std::env::var("TRANSCODE_STRATEGY")
                    .ok()
                    .and_then(|v| DashStrategy::parse(&v))
                    .unwrap_or(DashStrategy::FilterGraph),
            },
        })
    }
}

/// Parse `S3_QUALITY_BUCKETS` entries of the form `720p=vod-q720p,480p=vod-q480p`
fn parse_quality_buckets(raw: Option<&str>) -> HashMap<String, String> {
    let mut buckets = HashMap::new();
    let Some(raw) = raw else {
        return buckets;
    };

    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if let Some((quality, bucket)) = entry.split_once('=') {
            let quality = quality.trim().to_ascii_lowercase();
            let bucket = bucket.trim();
            if !quality.is_empty() && !bucket.is_empty() {
                buckets.insert(quality, bucket.to_string());
            }
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quality_buckets() {
        let buckets =
            parse_quality_buckets(Some("1080p=vod-q1080p, 720p=vod-q720p ,,bad-entry"));
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets.get("1080p").map(String::as_str), Some("vod-q1080p"));
        assert_eq!(buckets.get("720p").map(String::as_str), Some("vod-q720p"));
    }

    #[test]
    fn test_bucket_for_quality_falls_back_to_default() {
        let config = StorageConfig {
            bucket: "vod-originals".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            endpoint: None,
            quality_buckets: parse_quality_buckets(Some("720p=vod-q720p")),
        };
        assert_eq!(config.bucket_for_quality("720p"), "vod-q720p");
        assert_eq!(config.bucket_for_quality("1080P"), "vod-originals");
    }

    #[test]
    fn test_dash_strategy_parse() {
        assert_eq!(
            DashStrategy::parse("mapped"),
            Some(DashStrategy::MappedStreams)
        );
        assert_eq!(
            DashStrategy::parse("filter-graph"),
            Some(DashStrategy::FilterGraph)
        );
        assert_eq!(DashStrategy::parse("unknown"), None);
    }
}
