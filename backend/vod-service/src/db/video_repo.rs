/// Video asset repository - database operations for video assets
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewVideoAsset, VideoAsset};

/// Insert the asset record created once per successful ingestion
pub async fn insert_asset(pool: &PgPool, asset: NewVideoAsset) -> Result<VideoAsset> {
    let saved = sqlx::query_as::<_, VideoAsset>(
        "INSERT INTO video_assets (
            original_file_name,
            object_key,
            owner_id,
            content_type,
            size_bytes,
            bucket,
            thumbnail_object_key,
            status,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'uploaded', NOW())
        RETURNING id, original_file_name, object_key, owner_id, content_type,
            size_bytes, bucket, thumbnail_object_key, status, created_at",
    )
    .bind(&asset.original_file_name)
    .bind(&asset.object_key)
    .bind(asset.owner_id)
    .bind(&asset.content_type)
    .bind(asset.size_bytes)
    .bind(&asset.bucket)
    .bind(&asset.thumbnail_object_key)
    .fetch_one(pool)
    .await?;

    Ok(saved)
}

pub async fn get_asset(pool: &PgPool, video_id: Uuid) -> Result<Option<VideoAsset>> {
    let asset = sqlx::query_as::<_, VideoAsset>(
        "SELECT id, original_file_name, object_key, owner_id, content_type,
            size_bytes, bucket, thumbnail_object_key, status, created_at
         FROM video_assets
         WHERE id = $1",
    )
    .bind(video_id)
    .fetch_optional(pool)
    .await?;

    Ok(asset)
}

pub async fn list_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<VideoAsset>> {
    let assets = sqlx::query_as::<_, VideoAsset>(
        "SELECT id, original_file_name, object_key, owner_id, content_type,
            size_bytes, bucket, thumbnail_object_key, status, created_at
         FROM video_assets
         WHERE owner_id = $1
         ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(assets)
}
