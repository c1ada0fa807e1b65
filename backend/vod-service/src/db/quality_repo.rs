/// Quality record store - durable per-quality artifact state with bounded retry
///
/// Records are append-only: a failed attempt is never reconciled with an
/// earlier row, and callers resolve current state by taking the most recent
/// row per (video, quality).
use std::future::Future;
use std::time::Duration;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use video_core::{NewQualityRecord, QualityRecord};

use crate::error::{AppError, Result};

const SAVE_MAX_ATTEMPTS: u32 = 3;
const SAVE_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct QualityRecordStore {
    pool: PgPool,
}

impl QualityRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Save one record, retrying up to three attempts with exponential
    /// backoff (500 ms, 1000 ms). Exhausting retries raises a persistence
    /// error; the caller abandons that quality's record only.
    pub async fn save(&self, record: NewQualityRecord) -> Result<QualityRecord> {
        let saved = retry_with_backoff(SAVE_MAX_ATTEMPTS, SAVE_INITIAL_BACKOFF, || {
            let record = record.clone();
            async move { self.insert(record).await }
        })
        .await
        .map_err(|e| {
            AppError::Persistence(format!(
                "failed to save quality record for video {} quality {}: {}",
                record.video_id, record.quality, e
            ))
        })?;

        info!(
            video_id = %saved.video_id,
            quality = %saved.quality,
            "saved quality record"
        );
        Ok(saved)
    }

    /// Direct bulk write, no retry
    pub async fn save_all(&self, records: &[NewQualityRecord]) -> Result<Vec<QualityRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(records.len());
        for record in records {
            let row = sqlx::query_as::<_, QualityRecord>(INSERT_QUALITY)
                .bind(record.video_id)
                .bind(&record.quality)
                .bind(&record.resolution)
                .bind(&record.bitrate)
                .bind(&record.object_key)
                .bind(record.size_bytes)
                .bind(&record.content_type)
                .bind(&record.bucket_name)
                .bind(record.status.as_str())
                .fetch_one(tx.as_mut())
                .await?;
            saved.push(row);
        }
        tx.commit().await?;
        Ok(saved)
    }

    /// All records for a video, most recent first
    pub async fn find_by_video(&self, video_id: Uuid) -> Result<Vec<QualityRecord>> {
        let records = sqlx::query_as::<_, QualityRecord>(
            "SELECT id, video_id, quality, resolution, bitrate, object_key,
                size_bytes, content_type, bucket_name, status, created_at
             FROM video_qualities
             WHERE video_id = $1
             ORDER BY created_at DESC",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Most recent record for one (video, quality) pair
    pub async fn find_latest(
        &self,
        video_id: Uuid,
        quality: &str,
    ) -> Result<Option<QualityRecord>> {
        let record = sqlx::query_as::<_, QualityRecord>(
            "SELECT id, video_id, quality, resolution, bitrate, object_key,
                size_bytes, content_type, bucket_name, status, created_at
             FROM video_qualities
             WHERE video_id = $1 AND quality = $2
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(video_id)
        .bind(quality)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert(
        &self,
        record: NewQualityRecord,
    ) -> std::result::Result<QualityRecord, sqlx::Error> {
        sqlx::query_as::<_, QualityRecord>(INSERT_QUALITY)
            .bind(record.video_id)
            .bind(&record.quality)
            .bind(&record.resolution)
            .bind(&record.bitrate)
            .bind(&record.object_key)
            .bind(record.size_bytes)
            .bind(&record.content_type)
            .bind(&record.bucket_name)
            .bind(record.status.as_str())
            .fetch_one(&self.pool)
            .await
    }
}

const INSERT_QUALITY: &str = "INSERT INTO video_qualities (
        video_id, quality, resolution, bitrate, object_key,
        size_bytes, content_type, bucket_name, status, created_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
    RETURNING id, video_id, quality, resolution, bitrate, object_key,
        size_bytes, content_type, bucket_name, status, created_at";

/// Run `op` up to `max_attempts` times, doubling the backoff between
/// attempts. The last error is returned once attempts are exhausted.
pub(crate) async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    initial_backoff: Duration,
    mut op: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let mut backoff = initial_backoff;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts => {
                warn!(
                    attempt,
                    max_attempts,
                    error = %err,
                    "save attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_succeeds_after_two_failures() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(3, Duration::from_millis(1), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_after_three_failures() {
        let attempts = AtomicU32::new(0);
        let result: std::result::Result<u32, &str> =
            retry_with_backoff(3, Duration::from_millis(1), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("still down") }
            })
            .await;

        assert_eq!(result, Err("still down"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_doubles() {
        let start = tokio::time::Instant::now();
        let attempts = AtomicU32::new(0);
        let _: std::result::Result<(), &str> =
            retry_with_backoff(3, Duration::from_millis(500), || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            })
            .await;

        // 500 ms after the first failure, 1000 ms after the second
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }
}
