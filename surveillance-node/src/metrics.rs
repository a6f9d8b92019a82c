use prometheus::{Encoder, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::error::Result;

/// Node-wide counters. Shared by every worker; all updates are atomic.
pub struct Metrics {
    registry: Registry,
    pub frames_captured: IntCounterVec,
    pub frames_analyzed: IntCounterVec,
    pub read_failures: IntCounterVec,
    pub inference_failures: IntCounterVec,
    pub detections_total: IntCounter,
    pub alerts_total: IntCounter,
    pub storage_failures: IntCounter,
    pub dropped_events: IntCounter,
    pub camera_fps: GaugeVec,
    pub active_cameras: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("aieyes".to_string()), None)?;

        let frames_captured = IntCounterVec::new(
            Opts::new("frames_captured_total", "Frames read from camera sources"),
            &["camera"],
        )?;
        let frames_analyzed = IntCounterVec::new(
            Opts::new("frames_analyzed_total", "Frames passed to the detector"),
            &["camera"],
        )?;
        let read_failures = IntCounterVec::new(
            Opts::new("read_failures_total", "Failed frame reads"),
            &["camera"],
        )?;
        let inference_failures = IntCounterVec::new(
            Opts::new("inference_failures_total", "Frames whose detection call failed"),
            &["camera"],
        )?;
        let detections_total = IntCounter::new("detections_total", "Detections across all cameras")?;
        let alerts_total = IntCounter::new("alerts_total", "High and critical activity entries")?;
        let storage_failures = IntCounter::new("storage_failures_total", "Failed storage writes")?;
        let dropped_events = IntCounter::new("dropped_events_total", "Dispatch events dropped on a full queue")?;
        let camera_fps = GaugeVec::new(Opts::new("camera_fps", "Capture rate per camera"), &["camera"])?;
        let active_cameras = IntGauge::new("active_cameras", "Cameras with a running worker")?;

        registry.register(Box::new(frames_captured.clone()))?;
        registry.register(Box::new(frames_analyzed.clone()))?;
        registry.register(Box::new(read_failures.clone()))?;
        registry.register(Box::new(inference_failures.clone()))?;
        registry.register(Box::new(detections_total.clone()))?;
        registry.register(Box::new(alerts_total.clone()))?;
        registry.register(Box::new(storage_failures.clone()))?;
        registry.register(Box::new(dropped_events.clone()))?;
        registry.register(Box::new(camera_fps.clone()))?;
        registry.register(Box::new(active_cameras.clone()))?;
        #[cfg(target_os = "linux")]
        registry.register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;

        Ok(Self {
            registry,
            frames_captured,
            frames_analyzed,
            read_failures,
            inference_failures,
            detections_total,
            alerts_total,
            storage_failures,
            dropped_events,
            camera_fps,
            active_cameras,
        })
    }

    pub fn total_detections(&self) -> u64 {
        self.detections_total.get()
    }

    pub fn alert_count(&self) -> u64 {
        self.alerts_total.get()
    }

    pub fn forget_camera(&self, camera_id: &str) {
        let _ = self.camera_fps.remove_label_values(&[camera_id]);
    }

    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::error::SurveillanceError::MetricsError(e.to_string()))
    }
}
