use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::debug;

use crate::config::KafkaConfig;
use crate::models::{TranscodingJobEvent, VideoUploadedEvent};

/// Kafka producer wrapper for pipeline events.
#[derive(Clone)]
pub struct PipelineEventsProducer {
    inner: Arc<FutureProducer>,
    transcode_topic: String,
    transcode_ladder_topic: String,
    upload_events_topic: String,
}

impl PipelineEventsProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", "5000")
            .create()
            .with_context(|| format!("Failed to create Kafka producer for '{}'", config.brokers))?;

        Ok(Self {
            inner: Arc::new(producer),
            transcode_topic: config.transcode_topic.clone(),
            transcode_ladder_topic: config.transcode_ladder_topic.clone(),
            upload_events_topic: config.upload_events_topic.clone(),
        })
    }

    /// Publish one transcoding job.
    ///
    /// Events with a specific quality go to the single-quality topic keyed
    /// `"{video_id}-{quality}"`; full-ladder events go to the ladder topic.
    /// Delivery is fire-and-forget from the caller's perspective — failures
    /// are surfaced so the caller can log and count them, never retried here.
    pub async fn publish_transcode_job(&self, event: &TranscodingJobEvent) -> Result<()> {
        let topic = if event.quality.is_some() {
            &self.transcode_topic
        } else {
            &self.transcode_ladder_topic
        };
        let key = event.partition_key();
        let payload = serde_json::to_string(event)
            .context("Failed to serialize TranscodingJobEvent payload")?;

        let record = FutureRecord::to(topic).key(&key).payload(&payload);

        self.inner
            .send(record, Duration::from_secs(10))
            .await
            .map_err(|(err, _)| {
                anyhow::anyhow!("Failed to publish transcoding job event: {}", err)
            })?;

        debug!(topic = %topic, key = %key, "published transcoding job event");
        Ok(())
    }

    /// Publish the informational "video uploaded" notification.
    pub async fn publish_video_uploaded(&self, event: &VideoUploadedEvent) -> Result<()> {
        let key = event.id.to_string();
        let payload = serde_json::to_string(event)
            .context("Failed to serialize VideoUploadedEvent payload")?;

        let record = FutureRecord::to(&self.upload_events_topic)
            .key(&key)
            .payload(&payload);

        self.inner
            .send(record, Duration::from_secs(10))
            .await
            .map_err(|(err, _)| {
                anyhow::anyhow!("Failed to publish video uploaded event: {}", err)
            })?;

        Ok(())
    }
}
