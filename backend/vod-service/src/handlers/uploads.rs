/// Upload status handlers - progress polling and streaming
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpResponse};
use bytes::Bytes;

use crate::error::{AppError, Result};
use crate::progress::ProgressTracker;

/// Poll the progress of one upload session.
///
/// A vanished session (evicted or never created) is indistinguishable from
/// "never existed" and reported as not found; pollers treat it as terminal.
pub async fn get_progress(
    progress: web::Data<Arc<ProgressTracker>>,
    upload_id: web::Path<String>,
) -> Result<HttpResponse> {
    match progress.get(&upload_id) {
        Some(session) => Ok(HttpResponse::Ok().json(session)),
        None => Err(AppError::NotFound("Upload session not found".to_string())),
    }
}

/// Stream the progress of one upload session as server-sent events, one
/// snapshot per second, closing after a terminal phase is reached.
pub async fn stream_progress(
    progress: web::Data<Arc<ProgressTracker>>,
    upload_id: web::Path<String>,
) -> HttpResponse {
    let tracker = progress.get_ref().clone();
    let upload_id = upload_id.into_inner();

    struct StreamState {
        tracker: Arc<ProgressTracker>,
        upload_id: String,
        first: bool,
        done: bool,
    }

    let state = StreamState {
        tracker,
        upload_id,
        first: true,
        done: false,
    };

    let body = futures::stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        if !state.first {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        state.first = false;

        let event = match state.tracker.get(&state.upload_id) {
            Some(session) => {
                state.done = session.phase.is_terminal();
                let payload = serde_json::to_string(&session).unwrap_or_default();
                format!("data: {}\n\n", payload)
            }
            None => {
                // evicted or never existed; terminal for the poller
                state.done = true;
                "event: gone\ndata: {}\n\n".to_string()
            }
        };

        Some((Ok::<Bytes, actix_web::Error>(Bytes::from(event)), state))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(body)
}
