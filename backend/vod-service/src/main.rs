/// VOD Service - HTTP Server
///
/// Handles video uploads, progress tracking, and DASH delivery. Transcoding
/// jobs are dispatched to the event bus and consumed by the
/// `transcode-worker` binary.
use std::io;
use std::sync::Arc;

use actix_web::{middleware as actix_middleware, web, App, HttpResponse, HttpServer};
use sqlx::postgres::PgPoolOptions;

use vod_service::db::QualityRecordStore;
use vod_service::handlers;
use vod_service::kafka::PipelineEventsProducer;
use vod_service::metrics;
use vod_service::progress::ProgressTracker;
use vod_service::services::UploadCoordinator;
use vod_service::storage::{self, ObjectStorage};
use vod_service::Config;

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load configuration");

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(address = %bind_address, env = %config.app.env, "VOD service starting");

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    let s3_client = storage::get_client(&config.storage)
        .await
        .expect("Failed to initialize storage client");
    let object_storage = Arc::new(ObjectStorage::new(s3_client, config.storage.clone()));
    if let Err(err) = object_storage.health_check().await {
        tracing::error!(error = %err, "storage health check failed");
        return Err(io::Error::new(io::ErrorKind::Other, err.to_string()));
    }

    let producer =
        PipelineEventsProducer::new(&config.kafka).expect("Failed to create Kafka producer");

    let progress = Arc::new(ProgressTracker::new());
    let _sweeper = progress.spawn_sweeper();

    let coordinator = Arc::new(UploadCoordinator::new(
        db_pool.clone(),
        object_storage.clone(),
        producer,
        progress.clone(),
        config.transcode.clone(),
    ));
    let quality_store = QualityRecordStore::new(db_pool.clone());

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(progress.clone()))
            .app_data(web::Data::new(coordinator.clone()))
            .app_data(web::Data::new(quality_store.clone()))
            .app_data(web::Data::new(object_storage.clone()))
            .wrap(actix_middleware::Logger::default())
            .route(
                "/api/v1/health",
                web::get()
                    .to(|| async { HttpResponse::Ok().json(serde_json::json!({"status": "ok"})) }),
            )
            .route(
                "/api/v1/health/ready",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .route(
                "/api/v1/health/live",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            )
            .route(
                "/metrics",
                web::get().to(|| async {
                    HttpResponse::Ok()
                        .content_type("text/plain; version=0.0.4")
                        .body(metrics::export())
                }),
            )
            .service(
                web::scope("/api/v1")
                    .service(
                        web::scope("/uploads")
                            .route(
                                "/{upload_id}/progress",
                                web::get().to(handlers::get_progress),
                            )
                            .route(
                                "/{upload_id}/progress/stream",
                                web::get().to(handlers::stream_progress),
                            ),
                    )
                    .service(
                        web::scope("/videos")
                            .route("", web::post().to(handlers::upload_video))
                            .route("", web::get().to(handlers::list_videos))
                            .route("/{id}/thumbnail", web::get().to(handlers::get_thumbnail))
                            .route("/{id}/qualities", web::get().to(handlers::list_qualities))
                            .route("/{id}/manifest.mpd", web::get().to(handlers::get_manifest))
                            .route(
                                "/{id}/dash/{segment:.*}",
                                web::get().to(handlers::get_segment),
                            ),
                    ),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
