mod alerts;
mod control;
mod stream;

use actix_web::http::StatusCode;
use actix_web::{get, web, HttpResponse, ResponseError};
use serde_json::json;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::SurveillanceError;
use crate::storage::Storage;
use crate::surveillance::SurveillanceOrchestrator;

pub struct AppState {
    pub orchestrator: Arc<SurveillanceOrchestrator>,
    pub storage: Arc<dyn Storage>,
    pub server: ServerConfig,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(control::configure)
            .service(stream::live_alerts)
            .configure(alerts::configure),
    )
    .configure(stream::configure)
    .service(metrics);
}

impl ResponseError for SurveillanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            SurveillanceError::CameraNotFound(_) => StatusCode::NOT_FOUND,
            SurveillanceError::CameraUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

pub(crate) fn blocking_error(e: actix_web::error::BlockingError) -> SurveillanceError {
    SurveillanceError::ProcessingError(e.to_string())
}

#[get("/metrics")]
async fn metrics(state: web::Data<AppState>) -> Result<HttpResponse, SurveillanceError> {
    let body = state.orchestrator.metrics().render()?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}
