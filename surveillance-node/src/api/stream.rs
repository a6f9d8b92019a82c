use actix_web::{get, web, HttpResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::AppState;
use crate::camera::encode_jpeg;
use crate::error::SurveillanceError;
use crate::pipeline::FrameResult;

const BOUNDARY: &str = "frame";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(video_feed);
}

fn multipart_frame(jpeg: &[u8]) -> web::Bytes {
    let mut part = Vec::with_capacity(jpeg.len() + 64);
    part.extend_from_slice(format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", BOUNDARY).as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    web::Bytes::from(part)
}

/// Annotated frames at the publish interval, independent of the analysis rate.
/// The stream ends when the camera stops.
#[get("/video_feed/{camera_id}")]
async fn video_feed(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, SurveillanceError> {
    let camera_id = path.into_inner();
    if state.orchestrator.camera(&camera_id).is_none() {
        return Err(SurveillanceError::CameraNotFound(camera_id));
    }

    let orchestrator = state.orchestrator.clone();
    let interval = Duration::from_millis(state.server.stream_interval_ms.max(1));
    let quality = state.server.jpeg_quality;

    let body = async_stream::stream! {
        let mut ticker = tokio::time::interval(interval);
        let mut last: Option<(Arc<FrameResult>, web::Bytes)> = None;

        while orchestrator.is_active(&camera_id) {
            ticker.tick().await;
            let Some(result) = orchestrator.latest_frame(&camera_id) else {
                continue;
            };

            if let Some((sent, part)) = &last {
                if Arc::ptr_eq(sent, &result) {
                    yield Ok::<_, actix_web::Error>(part.clone());
                    continue;
                }
            }

            let frame = result.clone();
            match tokio::task::spawn_blocking(move || encode_jpeg(&frame.annotated_frame, quality)).await {
                Ok(Ok(jpeg)) => {
                    let part = multipart_frame(&jpeg);
                    last = Some((result, part.clone()));
                    yield Ok(part);
                }
                Ok(Err(e)) => warn!(camera = %camera_id, "Frame encoding failed: {}", e),
                Err(e) => warn!(camera = %camera_id, "Frame encoder task failed: {}", e),
            }
        }
        debug!(camera = %camera_id, "Video feed closed");
    };

    Ok(HttpResponse::Ok()
        .content_type(format!("multipart/x-mixed-replace; boundary={}", BOUNDARY))
        .streaming(body))
}

/// Server-sent `new_alert` events for every dispatched alert.
#[get("/alerts/live")]
pub(super) async fn live_alerts(state: web::Data<AppState>) -> HttpResponse {
    let events = BroadcastStream::new(state.orchestrator.dispatcher().subscribe()).filter_map(|item| match item {
        Ok(alert) => match serde_json::to_string(&alert) {
            Ok(json) => Some(Ok::<_, actix_web::Error>(web::Bytes::from(format!(
                "event: new_alert\ndata: {}\n\n",
                json
            )))),
            Err(e) => {
                warn!("Failed to serialize alert {}: {}", alert.id, e);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("Live alert subscriber lagged, skipped {} alerts", skipped);
            None
        }
    });

    HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-cache"))
        .content_type("text/event-stream")
        .streaming(events)
}
