//! Kafka consumer for transcoding jobs
//!
//! Pulls `TranscodingJobEvent`s from the single-quality and full-ladder
//! topics and hands each one to the transcoding orchestrator on its own
//! task. Delivery is at-least-once; duplicate job execution is tolerated
//! and there is no ordering guarantee across events.

use std::sync::Arc;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::error::{AppError, Result};
use crate::models::TranscodingJobEvent;
use crate::services::transcoding::TranscodingService;

/// Kafka consumer configuration
#[derive(Clone, Debug)]
pub struct TranscodeConsumerConfig {
    pub brokers: String,
    pub topics: Vec<String>,
    pub group_id: String,
}

impl From<&KafkaConfig> for TranscodeConsumerConfig {
    fn from(config: &KafkaConfig) -> Self {
        Self {
            brokers: config.brokers.clone(),
            topics: vec![
                config.transcode_topic.clone(),
                config.transcode_ladder_topic.clone(),
            ],
            group_id: config.group_id.clone(),
        }
    }
}

/// Kafka consumer driving the transcoding orchestrator
pub struct TranscodeConsumer {
    consumer: StreamConsumer,
    service: Arc<TranscodingService>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TranscodeConsumer {
    pub fn new(
        config: &TranscodeConsumerConfig,
        service: Arc<TranscodingService>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()
            .map_err(|e| AppError::Internal(format!("Failed to create Kafka consumer: {e}")))?;

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| AppError::Internal(format!("Failed to subscribe to topics: {e}")))?;

        info!(
            brokers = %config.brokers,
            topics = ?config.topics,
            group_id = %config.group_id,
            "Transcode consumer initialized"
        );

        Ok(Self {
            consumer,
            service,
            shutdown_rx,
        })
    }

    /// Run the consumer loop
    pub async fn run(&mut self) -> Result<()> {
        use futures::StreamExt;

        info!("Starting transcode consumer loop");

        let mut message_stream = self.consumer.stream();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping consumer");
                        break;
                    }
                }

                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => self.dispatch(msg.payload()),
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka consumer error");
                            // Continue consuming despite errors
                        }
                        None => {
                            warn!("Message stream ended unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        info!("Transcode consumer stopped");
        Ok(())
    }

    /// Parse a message and spawn one worker task for it
    fn dispatch(&self, payload: Option<&[u8]>) {
        let Some(payload) = payload else {
            debug!("Empty message payload, skipping");
            return;
        };

        let event: TranscodingJobEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Failed to parse transcoding job event, skipping");
                return;
            }
        };

        debug!(
            video_id = %event.video_id,
            quality = event.quality.as_deref().unwrap_or("ladder"),
            "Received transcoding job event"
        );

        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            let video_id = event.video_id;
            let quality = event.quality.clone();
            if let Err(e) = service.process_event(event).await {
                error!(
                    video_id = %video_id,
                    quality = quality.as_deref().unwrap_or("ladder"),
                    error = %e,
                    "Transcoding job failed"
                );
            }
        });
    }
}
