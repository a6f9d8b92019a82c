use actix_web::{get, post, web, HttpResponse};
use serde_json::json;

use super::control::LimitQuery;
use super::AppState;
use crate::error::SurveillanceError;

const DEFAULT_ALERT_LIMIT: usize = 50;
const DEFAULT_LOG_LIMIT: usize = 100;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_alerts)
        .service(acknowledge_alert)
        .service(resolve_alert)
        .service(list_logs);
}

#[get("/alerts")]
async fn list_alerts(
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, SurveillanceError> {
    let limit = query.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    let alerts = state.storage.recent_alerts(limit).await?;
    let today = state.storage.alerts_today().await?;

    Ok(HttpResponse::Ok().json(json!({
        "alerts": alerts,
        "alerts_today": today,
    })))
}

#[post("/alerts/{id}/acknowledge")]
async fn acknowledge_alert(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, SurveillanceError> {
    let alert_id = path.into_inner();
    let updated = state.storage.acknowledge_alert(&alert_id).await?;
    Ok(alert_update_response(updated, &alert_id, "acknowledged"))
}

#[post("/alerts/{id}/resolve")]
async fn resolve_alert(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, SurveillanceError> {
    let alert_id = path.into_inner();
    let updated = state.storage.resolve_alert(&alert_id).await?;
    Ok(alert_update_response(updated, &alert_id, "resolved"))
}

#[get("/logs")]
async fn list_logs(
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, SurveillanceError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let logs = state.storage.recent_logs(limit).await?;
    Ok(HttpResponse::Ok().json(json!({ "logs": logs })))
}

fn alert_update_response(updated: bool, alert_id: &str, action: &str) -> HttpResponse {
    if updated {
        HttpResponse::Ok().json(json!({
            "success": true,
            "message": format!("Alert {} {}", alert_id, action),
        }))
    } else {
        HttpResponse::NotFound().json(json!({
            "success": false,
            "message": format!("Alert {} not found", alert_id),
        }))
    }
}
