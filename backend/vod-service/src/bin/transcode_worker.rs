//! Transcode Worker - Kafka consumer for video transcoding jobs
//!
//! Listens for transcoding job events, downloads the source video, runs the
//! external encoder to produce a segmented DASH package, uploads the
//! outputs, and records completed qualities. Events are delivered
//! at-least-once; a failed job writes no record and relies on the bus's
//! redelivery policy for retry.
//!
//! Environment variables:
//! - DATABASE_URL: PostgreSQL URL for asset/quality tables
//! - KAFKA_BROKERS: Kafka broker addresses
//! - KAFKA_TRANSCODE_TOPIC: single-quality job topic
//! - KAFKA_TRANSCODE_LADDER_TOPIC: full-ladder job topic
//! - KAFKA_GROUP_ID: consumer group (default: "transcode-worker")
//! - S3_BUCKET / S3_QUALITY_BUCKETS / S3_ENDPOINT: storage layout
//! - FFMPEG_BIN / FFPROBE_BIN: encoder binaries
//! - TRANSCODE_TIMEOUT_SECS: per-job wall-clock timeout
//! - TRANSCODE_STRATEGY: "filter-graph" (default) or "mapped"

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::info;

use vod_service::db::QualityRecordStore;
use vod_service::kafka::{TranscodeConsumer, TranscodeConsumerConfig};
use vod_service::services::TranscodingService;
use vod_service::storage::{self, ObjectStorage};
use vod_service::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("transcode_worker=info".parse().expect("valid directive"))
                .add_directive("vod_service=info".parse().expect("valid directive")),
        )
        .init();

    info!("Starting Transcode Worker");

    dotenvy::dotenv().ok();
    let config = Config::from_env().map_err(|e| format!("{e}"))?;
    info!(
        brokers = %config.kafka.brokers,
        topic = %config.kafka.transcode_topic,
        ladder_topic = %config.kafka.transcode_ladder_topic,
        group_id = %config.kafka.group_id,
        "Configuration loaded"
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| format!("Failed to connect to database: {e}"))?;

    let s3_client = storage::get_client(&config.storage)
        .await
        .map_err(|e| format!("{e}"))?;
    let object_storage = Arc::new(ObjectStorage::new(s3_client, config.storage.clone()));
    object_storage
        .health_check()
        .await
        .map_err(|e| format!("{e}"))?;
    info!("Storage client initialized");

    let service = Arc::new(TranscodingService::new(
        object_storage,
        QualityRecordStore::new(db_pool),
        &config.transcode,
    ));

    // Handle SIGTERM/SIGINT for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl+c");
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let consumer_config = TranscodeConsumerConfig::from(&config.kafka);
    let mut consumer = TranscodeConsumer::new(&consumer_config, service, shutdown_rx)
        .map_err(|e| format!("{e}"))?;
    info!("Kafka consumer initialized");

    consumer.run().await.map_err(|e| format!("{e}"))?;

    info!("Transcode worker stopped");
    Ok(())
}
