use aieyes_common::{BBox, Detection, ThreatType};
use aieyes_surveillance::alerts::{AlertDispatcher, NotificationSink};
use aieyes_surveillance::camera::worker::{WorkerContext, WorkerState};
use aieyes_surveillance::camera::{SourceFactory, VideoSource};
use aieyes_surveillance::config::{AlertConfig, CameraConfig, CameraOrigin, PipelineConfig, WorkerConfig};
use aieyes_surveillance::detection::DetectionProvider;
use aieyes_surveillance::metrics::Metrics;
use aieyes_surveillance::pipeline::{Annotator, FrameProcessingPipeline};
use aieyes_surveillance::storage::{InMemoryStorage, Storage};
use aieyes_surveillance::surveillance::{
    ActivityLog, LogCategory, ResultRegistry, SurveillanceOrchestrator,
};
use aieyes_surveillance::{Result, SurveillanceError};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct ScriptedSource {
    reachable: bool,
    fail_reads_after: Option<usize>,
    reads: usize,
    opens: Arc<AtomicUsize>,
}

impl VideoSource for ScriptedSource {
    fn open(&mut self) -> Result<()> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.reachable {
            Ok(())
        } else {
            Err(SurveillanceError::CameraError("connection refused".to_string()))
        }
    }

    fn read(&mut self) -> Result<RgbImage> {
        self.reads += 1;
        match self.fail_reads_after {
            Some(limit) if self.reads > limit => {
                Err(SurveillanceError::CameraError("stream ended".to_string()))
            }
            _ => Ok(RgbImage::from_pixel(64, 48, Rgb([90, 90, 90]))),
        }
    }

    fn release(&mut self) {}

    fn describe(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct ScriptedFactory {
    unreachable: HashSet<String>,
    flaky: HashSet<String>,
    opens: Arc<AtomicUsize>,
}

impl SourceFactory for ScriptedFactory {
    fn create(&self, camera: &CameraConfig) -> Result<Box<dyn VideoSource>> {
        Ok(Box::new(ScriptedSource {
            reachable: !self.unreachable.contains(&camera.id),
            fail_reads_after: self.flaky.contains(&camera.id).then_some(3),
            reads: 0,
            opens: self.opens.clone(),
        }))
    }
}

/// An armed person: knife held next to a person.
struct ArmedPersonDetector;

impl DetectionProvider for ArmedPersonDetector {
    fn detect(&self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        Ok(vec![
            Detection::new("person", 0.92, BBox::new(10.0, 5.0, 40.0, 45.0), 0),
            Detection::new("knife", 0.81, BBox::new(30.0, 20.0, 38.0, 30.0), 43),
        ])
    }
}

struct SilentSink;

#[async_trait]
impl NotificationSink for SilentSink {
    async fn notify(&self, _alert: &aieyes_common::AlertPayload) -> Result<()> {
        Ok(())
    }
}

fn camera(id: &str) -> CameraConfig {
    CameraConfig {
        id: id.to_string(),
        name: id.to_string(),
        location: format!("{} hallway", id),
        source: format!("http://10.0.0.5:8080/{}", id),
        ..CameraConfig::default()
    }
}

struct Harness {
    orchestrator: Arc<SurveillanceOrchestrator>,
    storage: Arc<InMemoryStorage>,
    opens: Arc<AtomicUsize>,
}

fn harness(cameras: Vec<CameraConfig>, factory: ScriptedFactory) -> Harness {
    let opens = factory.opens.clone();
    let storage = Arc::new(InMemoryStorage::new());
    let metrics = Arc::new(Metrics::new().unwrap());
    let alerts = AlertConfig {
        snapshot_dir: None,
        ..AlertConfig::default()
    };
    let dispatcher = AlertDispatcher::start(&alerts, storage.clone(), Arc::new(SilentSink), metrics.clone());

    let pipeline_config = PipelineConfig {
        detect_every_n_frames: 2,
        inference_scale: 1.0,
        ..PipelineConfig::default()
    };
    let pipeline = Arc::new(FrameProcessingPipeline::new(
        Arc::new(ArmedPersonDetector),
        None,
        Annotator::new(None),
        pipeline_config,
    ));

    let worker = WorkerConfig {
        frame_interval_ms: 5,
        read_retry_ms: 5,
        initial_read_attempts: 2,
        initial_retry_ms: 5,
        reopen_after_failures: 3,
        ..WorkerConfig::default()
    };
    let ctx = WorkerContext {
        pipeline,
        registry: Arc::new(ResultRegistry::new()),
        activity_log: Arc::new(ActivityLog::new(alerts.log_capacity)),
        metrics,
        dispatcher,
        config: worker,
        loitering_frames: 150,
    };

    Harness {
        orchestrator: Arc::new(SurveillanceOrchestrator::new(cameras, Arc::new(factory), ctx)),
        storage,
        opens,
    }
}

async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..300 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn running_camera_publishes_frames_and_raises_alerts() {
    let h = harness(vec![camera("cam1")], ScriptedFactory::default());
    let orchestrator = h.orchestrator.clone();

    assert!(orchestrator.start_camera("cam1").unwrap());
    assert!(!orchestrator.start_camera("cam1").unwrap());

    assert!(
        eventually(|| orchestrator
            .latest_frame("cam1")
            .map_or(false, |r| r.frame_index >= 4))
        .await
    );

    let latest = orchestrator.latest_frame("cam1").unwrap();
    assert_eq!(latest.annotated_frame.dimensions(), (64, 48));
    assert_eq!(latest.weapons().len(), 1);

    let status = orchestrator.status();
    assert_eq!(status.active_cameras, 1);
    assert!(status.total_detections >= 2);
    assert!(status.alert_count >= 1);
    assert_eq!(status.per_camera_stats[0].state, WorkerState::Running);

    let activities = orchestrator.recent_activities(50);
    assert!(activities
        .iter()
        .any(|e| e.description == "WEAPON DETECTED: knife" && e.is_alert));

    let storage = h.storage.clone();
    let mut stored = Vec::new();
    for _ in 0..300 {
        stored = storage.recent_alerts(10).await.unwrap();
        if !stored.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // cooldown keeps a continuous threat to one alert
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].alert_type, ThreatType::ArmedThreat.as_str());
    assert_eq!(stored[0].camera_id, "cam1");

    assert!(orchestrator.stop_camera("cam1").unwrap());
    assert!(!orchestrator.stop_camera("cam1").unwrap());
    assert!(orchestrator.latest_frame("cam1").is_none());
    assert_eq!(orchestrator.status().active_cameras, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_camera_fails_to_start() {
    let factory = ScriptedFactory {
        unreachable: HashSet::from(["cam2".to_string()]),
        ..ScriptedFactory::default()
    };
    let h = harness(vec![camera("cam2")], factory);

    let err = h.orchestrator.start_camera("cam2").unwrap_err();
    assert!(matches!(err, SurveillanceError::CameraUnreachable(_)));
    assert!(!h.orchestrator.is_active("cam2"));
    // manual cameras retry the initial read
    assert_eq!(h.opens.load(Ordering::SeqCst), 2);

    let entries = h.orchestrator.recent_activities(10);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].category, LogCategory::System);
    assert!(!entries[0].is_alert);
    assert_eq!(h.orchestrator.status().alert_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_auto_detected_camera_gets_one_attempt() {
    let factory = ScriptedFactory {
        unreachable: HashSet::from(["camera_1_9".to_string()]),
        ..ScriptedFactory::default()
    };
    let discovered = CameraConfig {
        origin: CameraOrigin::AutoDetected,
        ..camera("camera_1_9")
    };
    let h = harness(vec![discovered], factory);

    let err = h.orchestrator.start_camera("camera_1_9").unwrap_err();
    assert!(matches!(err, SurveillanceError::CameraUnreachable(_)));
    assert_eq!(h.opens.load(Ordering::SeqCst), 1);
    assert!(!h.orchestrator.is_active("camera_1_9"));

    // a later manual start is still allowed and again tries once
    assert!(h.orchestrator.start_camera("camera_1_9").is_err());
    assert_eq!(h.opens.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_camera_is_not_found() {
    let h = harness(vec![camera("cam1")], ScriptedFactory::default());
    assert!(matches!(
        h.orchestrator.start_camera("nope"),
        Err(SurveillanceError::CameraNotFound(_))
    ));
    assert!(matches!(
        h.orchestrator.stop_camera("nope"),
        Err(SurveillanceError::CameraNotFound(_))
    ));
    assert!(!h.orchestrator.stop_camera("cam1").unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_all_reports_each_camera_and_stop_all_stops_them() {
    let factory = ScriptedFactory {
        unreachable: HashSet::from(["cam3".to_string()]),
        ..ScriptedFactory::default()
    };
    let h = harness(vec![camera("cam1"), camera("cam2"), camera("cam3")], factory);

    let report = h.orchestrator.start_all();
    let mut started = report.started.clone();
    started.sort();
    assert_eq!(started, vec!["cam1".to_string(), "cam2".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].camera_id, "cam3");

    let again = h.orchestrator.start_all();
    assert_eq!(again.already_active.len(), 2);

    assert_eq!(h.orchestrator.stop_all(), 2);
    assert_eq!(h.orchestrator.stop_all(), 0);
    assert!(h.orchestrator.cameras().iter().all(|c| c.state == WorkerState::Stopped));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_reads_mark_camera_degraded_and_reopen() {
    let factory = ScriptedFactory {
        flaky: HashSet::from(["cam1".to_string()]),
        ..ScriptedFactory::default()
    };
    let h = harness(vec![camera("cam1")], factory);
    let orchestrator = h.orchestrator.clone();

    assert!(orchestrator.start_camera("cam1").unwrap());
    assert!(eventually(|| orchestrator.registry().worker_state("cam1") == Some(WorkerState::Reconnecting)).await);
    assert!(eventually(|| h.opens.load(Ordering::SeqCst) >= 2).await);

    let stats = orchestrator.status().per_camera_stats;
    assert_eq!(stats[0].status, aieyes_common::CameraStatus::Degraded);
    assert!(orchestrator
        .recent_activities(50)
        .iter()
        .any(|e| e.category == LogCategory::System && e.description.starts_with("Frame read failed")));

    assert!(orchestrator.stop_camera("cam1").unwrap());
}
