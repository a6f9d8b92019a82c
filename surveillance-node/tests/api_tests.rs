use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use aieyes_common::{Detection, Severity, ThreatType};
use aieyes_surveillance::alerts::{AlertDispatcher, NotificationSink};
use aieyes_surveillance::api::{self, AppState};
use aieyes_surveillance::camera::worker::WorkerContext;
use aieyes_surveillance::camera::{SourceFactory, VideoSource};
use aieyes_surveillance::config::{AlertConfig, CameraConfig, PipelineConfig, ServerConfig, WorkerConfig};
use aieyes_surveillance::detection::DetectionProvider;
use aieyes_surveillance::metrics::Metrics;
use aieyes_surveillance::pipeline::{Annotator, FrameProcessingPipeline};
use aieyes_surveillance::storage::{InMemoryStorage, NewAlert, Storage};
use aieyes_surveillance::surveillance::{ActivityLog, ResultRegistry, SurveillanceOrchestrator};
use aieyes_surveillance::Result;
use async_trait::async_trait;
use chrono::Utc;
use image::{Rgb, RgbImage};
use serde_json::Value;
use std::sync::Arc;

struct StillSource;

impl VideoSource for StillSource {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self) -> Result<RgbImage> {
        Ok(RgbImage::from_pixel(32, 24, Rgb([40, 40, 40])))
    }

    fn release(&mut self) {}

    fn describe(&self) -> &str {
        "still"
    }
}

struct StillFactory;

impl SourceFactory for StillFactory {
    fn create(&self, _camera: &CameraConfig) -> Result<Box<dyn VideoSource>> {
        Ok(Box::new(StillSource))
    }
}

struct EmptyScene;

impl DetectionProvider for EmptyScene {
    fn detect(&self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}

struct SilentSink;

#[async_trait]
impl NotificationSink for SilentSink {
    async fn notify(&self, _alert: &aieyes_common::AlertPayload) -> Result<()> {
        Ok(())
    }
}

fn state() -> (web::Data<AppState>, Arc<InMemoryStorage>) {
    let storage = Arc::new(InMemoryStorage::new());
    let metrics = Arc::new(Metrics::new().unwrap());
    let alerts = AlertConfig {
        snapshot_dir: None,
        ..AlertConfig::default()
    };
    let dispatcher = AlertDispatcher::start(&alerts, storage.clone(), Arc::new(SilentSink), metrics.clone());
    let pipeline = Arc::new(FrameProcessingPipeline::new(
        Arc::new(EmptyScene),
        None,
        Annotator::new(None),
        PipelineConfig::default(),
    ));
    let ctx = WorkerContext {
        pipeline,
        registry: Arc::new(ResultRegistry::new()),
        activity_log: Arc::new(ActivityLog::new(alerts.log_capacity)),
        metrics,
        dispatcher,
        config: WorkerConfig {
            frame_interval_ms: 5,
            ..WorkerConfig::default()
        },
        loitering_frames: 150,
    };
    let camera = CameraConfig {
        id: "lobby".to_string(),
        name: "Lobby".to_string(),
        location: "Main entrance".to_string(),
        source: "http://10.0.0.7/video".to_string(),
        ..CameraConfig::default()
    };
    let orchestrator = Arc::new(SurveillanceOrchestrator::new(vec![camera], Arc::new(StillFactory), ctx));

    let state = web::Data::new(AppState {
        orchestrator,
        storage: storage.clone(),
        server: ServerConfig::default(),
    });
    (state, storage)
}

#[actix_web::test]
async fn camera_control_round_trip() {
    let (state, _) = state();
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = test::TestRequest::get().uri("/api/cameras").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["cameras"][0]["id"], "lobby");
    assert_eq!(body["cameras"][0]["state"], "stopped");

    let req = test::TestRequest::post().uri("/api/start/lobby").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Started surveillance on lobby");

    let req = test::TestRequest::post().uri("/api/start/lobby").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["message"], "lobby already active");

    let req = test::TestRequest::get().uri("/api/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["active_cameras"], 1);

    let req = test::TestRequest::post().uri("/api/stop/lobby").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["message"], "Stopped surveillance on lobby");

    let req = test::TestRequest::post().uri("/api/stop/lobby").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["message"], "lobby not active");

    let req = test::TestRequest::get().uri("/api/activities?limit=10").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let descriptions: Vec<&str> = body["activities"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["description"].as_str())
        .collect();
    assert_eq!(descriptions, vec!["Surveillance stopped", "Surveillance started"]);
}

#[actix_web::test]
async fn unknown_camera_is_404() {
    let (state, _) = state();
    let app = test::init_service(App::new().app_data(state).configure(api::configure)).await;

    for req in [
        test::TestRequest::post().uri("/api/start/garage").to_request(),
        test::TestRequest::post().uri("/api/stop/garage").to_request(),
        test::TestRequest::get().uri("/video_feed/garage").to_request(),
    ] {
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }
}

#[actix_web::test]
async fn alerts_can_be_listed_and_acknowledged() {
    let (state, storage) = state();
    let id = storage
        .create_alert(NewAlert {
            camera_id: "lobby".to_string(),
            alert_type: ThreatType::WeaponDetected,
            message: "Weapon detected: knife".to_string(),
            severity: Severity::Critical,
            image_path: None,
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
    let app = test::init_service(App::new().app_data(state).configure(api::configure)).await;

    let req = test::TestRequest::get().uri("/api/alerts").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["alerts_today"], 1);
    assert_eq!(body["alerts"][0]["type"], ThreatType::WeaponDetected.as_str());
    assert_eq!(body["alerts"][0]["acknowledged"], false);

    let req = test::TestRequest::post()
        .uri(&format!("/api/alerts/{}/acknowledge", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(storage.recent_alerts(1).await.unwrap()[0].acknowledged);

    let req = test::TestRequest::post().uri("/api/alerts/404/resolve").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn metrics_are_exposed_as_text() {
    let (state, _) = state();
    let app = test::init_service(App::new().app_data(state).configure(api::configure)).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("aieyes_"));
}
