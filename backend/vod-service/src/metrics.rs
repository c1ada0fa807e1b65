/// Prometheus counters for the media pipeline
///
/// Job dispatch is fire-and-forget, so publish failures are silent data-loss
/// risks; the published-vs-completed pair below is what external monitoring
/// compares.
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

pub static TRANSCODE_JOBS_PUBLISHED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vod_transcode_jobs_published_total",
        "Transcoding job events successfully published"
    )
    .expect("metric registered")
});

pub static TRANSCODE_JOB_PUBLISH_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vod_transcode_job_publish_failures_total",
        "Transcoding job events that failed to publish"
    )
    .expect("metric registered")
});

pub static TRANSCODE_JOBS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vod_transcode_jobs_started_total",
        "Transcoding job events picked up by a worker"
    )
    .expect("metric registered")
});

pub static TRANSCODE_JOBS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vod_transcode_jobs_completed_total",
        "Transcoding jobs that completed and recorded their qualities"
    )
    .expect("metric registered")
});

pub static TRANSCODE_JOBS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vod_transcode_jobs_failed_total",
        "Transcoding jobs abandoned after a download/encode/upload failure"
    )
    .expect("metric registered")
});

pub static UPLOADS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("vod_uploads_completed_total", "Ingestions that completed")
        .expect("metric registered")
});

pub static UPLOADS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("vod_uploads_failed_total", "Ingestions that failed")
        .expect("metric registered")
});

/// Render all registered metrics in the Prometheus text format
pub fn export() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increment() {
        let before = TRANSCODE_JOB_PUBLISH_FAILURES.get();
        TRANSCODE_JOB_PUBLISH_FAILURES.inc();
        assert_eq!(TRANSCODE_JOB_PUBLISH_FAILURES.get(), before + 1);
    }

    #[test]
    fn test_export_contains_registered_metric() {
        TRANSCODE_JOBS_PUBLISHED.inc();
        let rendered = export();
        assert!(rendered.contains("vod_transcode_jobs_published_total"));
    }
}
