use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::{blocking_error, AppState};
use crate::error::SurveillanceError;

const DEFAULT_ACTIVITY_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(status)
        .service(activities)
        .service(cameras)
        .service(start_all)
        .service(stop_all)
        .service(start_camera)
        .service(stop_camera);
}

#[get("/status")]
async fn status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.orchestrator.status())
}

#[get("/activities")]
async fn activities(state: web::Data<AppState>, query: web::Query<LimitQuery>) -> HttpResponse {
    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    HttpResponse::Ok().json(json!({
        "activities": state.orchestrator.recent_activities(limit),
    }))
}

#[get("/cameras")]
async fn cameras(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "cameras": state.orchestrator.cameras(),
    }))
}

#[post("/start_all")]
async fn start_all(state: web::Data<AppState>) -> Result<HttpResponse, SurveillanceError> {
    let orchestrator = state.orchestrator.clone();
    let report = web::block(move || orchestrator.start_all())
        .await
        .map_err(blocking_error)?;

    let active = state.orchestrator.status().active_cameras;
    Ok(HttpResponse::Ok().json(json!({
        "success": report.failed.is_empty(),
        "message": format!("Surveillance active on {} cameras", active),
        "report": report,
    })))
}

#[post("/stop_all")]
async fn stop_all(state: web::Data<AppState>) -> Result<HttpResponse, SurveillanceError> {
    let orchestrator = state.orchestrator.clone();
    let stopped = web::block(move || orchestrator.stop_all())
        .await
        .map_err(blocking_error)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Stopped surveillance on {} cameras", stopped),
    })))
}

#[post("/start/{camera_id}")]
async fn start_camera(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, SurveillanceError> {
    let camera_id = path.into_inner();
    let orchestrator = state.orchestrator.clone();
    let id = camera_id.clone();
    let started = web::block(move || orchestrator.start_camera(&id))
        .await
        .map_err(blocking_error)??;

    let message = if started {
        format!("Started surveillance on {}", camera_id)
    } else {
        format!("{} already active", camera_id)
    };
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": message })))
}

#[post("/stop/{camera_id}")]
async fn stop_camera(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, SurveillanceError> {
    let camera_id = path.into_inner();
    let orchestrator = state.orchestrator.clone();
    let id = camera_id.clone();
    let stopped = web::block(move || orchestrator.stop_camera(&id))
        .await
        .map_err(blocking_error)??;

    let message = if stopped {
        format!("Stopped surveillance on {}", camera_id)
    } else {
        format!("{} not active", camera_id)
    };
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": message })))
}
