/// Video delivery handlers - upload, thumbnails, manifests, segments, and
/// quality listings
use std::collections::HashSet;
use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::http::header::CONTENT_LENGTH;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use video_core::QualityRecordStatus;

use crate::db::{video_repo, QualityRecordStore};
use crate::error::{AppError, Result};
use crate::models::{QualityResponse, UploadAccepted, VideoAssetResponse};
use crate::services::transcoding::{artifact_content_type, base_key, manifest_key};
use crate::services::{UploadCoordinator, UploadMeta};
use crate::storage::ObjectStorage;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Declared file size; falls back to the request content length
    pub size: Option<u64>,
}

fn owner_id_from_request(req: &HttpRequest) -> Result<Uuid> {
    let raw = req
        .headers()
        .get("X-Owner-Id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("missing X-Owner-Id header".to_string()))?;
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("invalid X-Owner-Id header".to_string()))
}

/// Ingest one uploaded video file (multipart field `file`)
pub async fn upload_video(
    coordinator: web::Data<Arc<UploadCoordinator>>,
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    mut payload: Multipart,
) -> Result<HttpResponse> {
    let owner_id = owner_id_from_request(&req)?;

    let content_length = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let total_bytes = query
        .size
        .or(content_length)
        .ok_or_else(|| AppError::Validation("unknown upload size".to_string()))?;

    while let Some(field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart payload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let meta = UploadMeta {
            file_name,
            content_type,
            total_bytes,
        };

        let outcome = coordinator.ingest(field, meta, owner_id).await?;
        return Ok(HttpResponse::Ok().json(UploadAccepted {
            video_id: outcome.video_id.to_string(),
            upload_id: outcome.upload_id,
        }));
    }

    Err(AppError::Validation(
        "multipart payload has no file field".to_string(),
    ))
}

/// List the caller's video assets
pub async fn list_videos(
    pool: web::Data<PgPool>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let owner_id = owner_id_from_request(&req)?;
    let assets = video_repo::list_by_owner(pool.get_ref(), owner_id).await?;
    let response: Vec<VideoAssetResponse> =
        assets.into_iter().map(VideoAssetResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

/// Serve the thumbnail bytes for a video
pub async fn get_thumbnail(
    pool: web::Data<PgPool>,
    storage: web::Data<Arc<ObjectStorage>>,
    video_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let asset = video_repo::get_asset(pool.get_ref(), *video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video not found: {}", video_id)))?;

    let thumbnail_key = asset
        .thumbnail_object_key
        .ok_or_else(|| AppError::NotFound(format!("Video has no thumbnail: {}", video_id)))?;

    let data = storage.get_bytes(&asset.bucket, &thumbnail_key).await?;

    Ok(HttpResponse::Ok().content_type("image/jpeg").body(data))
}

/// List completed qualities with ready-to-use download paths.
///
/// Records are append-only, so only the most recent row per quality counts.
pub async fn list_qualities(
    quality_store: web::Data<QualityRecordStore>,
    video_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let records = quality_store.find_by_video(*video_id).await?;

    let mut seen = HashSet::new();
    let qualities: Vec<QualityResponse> = records
        .into_iter()
        .filter(|record| seen.insert(record.quality.clone()))
        .filter(|record| record.get_status() == QualityRecordStatus::Completed)
        .map(QualityResponse::from_record)
        .collect();

    Ok(HttpResponse::Ok().json(qualities))
}

/// Serve the DASH manifest bytes for a video
pub async fn get_manifest(
    pool: web::Data<PgPool>,
    storage: web::Data<Arc<ObjectStorage>>,
    video_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let asset = video_repo::get_asset(pool.get_ref(), *video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video not found: {}", video_id)))?;

    let key = manifest_key(&asset.object_key);
    let data = storage.get_bytes(&asset.bucket, &key).await?;

    Ok(HttpResponse::Ok()
        .content_type("application/dash+xml")
        .body(data))
}

/// Serve one DASH segment; the path suffix is passed through verbatim to
/// the storage key
pub async fn get_segment(
    pool: web::Data<PgPool>,
    storage: web::Data<Arc<ObjectStorage>>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse> {
    let (video_id, segment) = path.into_inner();

    let asset = video_repo::get_asset(pool.get_ref(), video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video not found: {}", video_id)))?;

    let key = format!("{}/dash/{}", base_key(&asset.object_key), segment);
    let data = storage.get_bytes(&asset.bucket, &key).await?;

    Ok(HttpResponse::Ok()
        .content_type(artifact_content_type(&segment))
        .body(data))
}
