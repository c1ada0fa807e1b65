//! Event bus adapters (Kafka)

pub mod consumer;
pub mod producer;

pub use consumer::{TranscodeConsumer, TranscodeConsumerConfig};
pub use producer::PipelineEventsProducer;
