use aieyes_common::{ActivityEvent, Detection};
use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::detection::{sanitize, DetectionProvider};
use crate::face::{FaceStage, FaceVerification};

pub mod activity;
pub mod annotate;
pub mod scaling;
pub mod state;
pub mod threat;
pub mod tracker;

pub use annotate::Annotator;
pub use state::{FpsMeter, PerCameraState};
pub use threat::ThreatAssessment;

use activity::{ActivityInput, ActivityRules};
use threat::ThreatParams;

/// Outcome of running the detector and rules over one analyzed frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameAnalysis {
    pub analyzed_frame: u64,
    pub analyzed_at: DateTime<Utc>,
    pub detections: Vec<Detection>,
    pub persons: Vec<Detection>,
    pub weapons: Vec<Detection>,
    pub bags: Vec<Detection>,
    pub activities: Vec<ActivityEvent>,
    pub faces: Vec<FaceVerification>,
    pub threat: ThreatAssessment,
    /// The detector failed and this frame carries no detections.
    pub degraded: bool,
}

impl FrameAnalysis {
    pub fn empty(frame_index: u64) -> Self {
        Self {
            analyzed_frame: frame_index,
            analyzed_at: Utc::now(),
            detections: Vec::new(),
            persons: Vec::new(),
            weapons: Vec::new(),
            bags: Vec::new(),
            activities: Vec::new(),
            faces: Vec::new(),
            threat: ThreatAssessment::none(),
            degraded: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameResult {
    pub camera_id: String,
    pub frame_index: u64,
    pub timestamp: DateTime<Utc>,
    pub annotated_frame: RgbImage,
    pub analysis: Arc<FrameAnalysis>,
    /// `true` when the analysis was computed for this frame rather than reused.
    pub fresh: bool,
}

impl FrameResult {
    pub fn detections(&self) -> &[Detection] {
        &self.analysis.detections
    }

    pub fn activities(&self) -> &[ActivityEvent] {
        &self.analysis.activities
    }

    pub fn persons(&self) -> &[Detection] {
        &self.analysis.persons
    }

    pub fn weapons(&self) -> &[Detection] {
        &self.analysis.weapons
    }

    pub fn bags(&self) -> &[Detection] {
        &self.analysis.bags
    }

    pub fn threat(&self) -> &ThreatAssessment {
        &self.analysis.threat
    }
}

pub struct FrameProcessingPipeline {
    detector: Arc<dyn DetectionProvider>,
    faces: Option<FaceStage>,
    annotator: Annotator,
    config: PipelineConfig,
    rules: ActivityRules,
    threat_params: ThreatParams,
}

impl FrameProcessingPipeline {
    pub fn new(
        detector: Arc<dyn DetectionProvider>,
        faces: Option<FaceStage>,
        annotator: Annotator,
        config: PipelineConfig,
    ) -> Self {
        let rules = ActivityRules::from(&config);
        let threat_params = ThreatParams::from(&config);
        Self {
            detector,
            faces,
            annotator,
            config,
            rules,
            threat_params,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyzes every Nth frame (or the first one seen) and reuses the cached analysis
    /// in between. The overlay is always drawn on the current frame.
    pub fn process(
        &self,
        frame: &RgbImage,
        camera_id: &str,
        frame_index: u64,
        state: &mut PerCameraState,
    ) -> FrameResult {
        let timestamp = Utc::now();
        state.frame_count += 1;

        if frame.width() == 0 || frame.height() == 0 {
            debug!(camera = %camera_id, frame = frame_index, "Empty frame");
            return FrameResult {
                camera_id: camera_id.to_string(),
                frame_index,
                timestamp,
                annotated_frame: frame.clone(),
                analysis: Arc::new(FrameAnalysis::empty(frame_index)),
                fresh: false,
            };
        }

        let due = frame_index % self.config.detect_every_n_frames.max(1) == 0;
        let reusable = if due { None } else { state.cached.clone() };
        let (analysis, fresh) = match reusable {
            Some(cached) => (cached, false),
            None => {
                let analysis = Arc::new(self.analyze(frame, camera_id, frame_index, state));
                state.cached = Some(analysis.clone());
                (analysis, true)
            }
        };

        let annotated_frame = self.annotator.render(frame, camera_id, &analysis, timestamp);

        FrameResult {
            camera_id: camera_id.to_string(),
            frame_index,
            timestamp,
            annotated_frame,
            analysis,
            fresh,
        }
    }

    fn analyze(
        &self,
        frame: &RgbImage,
        camera_id: &str,
        frame_index: u64,
        state: &mut PerCameraState,
    ) -> FrameAnalysis {
        let (small, factor) = scaling::downscale(frame, self.config.inference_scale);

        let (detections, degraded) = match self.detector.detect(&small) {
            Ok(raw) => {
                let native = raw
                    .into_iter()
                    .map(|mut d| {
                        d.bbox = factor.to_native(&d.bbox);
                        d
                    })
                    .collect();
                (sanitize(native, 0.0), false)
            }
            Err(e) => {
                warn!(camera = %camera_id, frame = frame_index, "Detection failed: {}", e);
                (Vec::new(), true)
            }
        };

        let persons = self.detector.filter_persons(&detections);
        let weapons = self.detector.filter_weapons(&detections);
        let bags = self.detector.filter_bags(&detections);

        let tracked = state.tracker.update(&persons, frame_index);
        let loitering = state.loitering.observe(&tracked);

        let faces = self
            .faces
            .as_ref()
            .map(|stage| stage.run(frame))
            .unwrap_or_default();

        let activities = activity::evaluate(
            ActivityInput {
                detections: &detections,
                persons: &persons,
                weapons: &weapons,
                bags: &bags,
                loitering,
                faces: &faces,
            },
            &self.rules,
        );
        let threat = threat::assess(&tracked, &weapons, &faces, &self.threat_params);

        FrameAnalysis {
            analyzed_frame: frame_index,
            analyzed_at: Utc::now(),
            detections,
            persons,
            weapons,
            bags,
            activities,
            faces,
            threat,
            degraded,
        }
    }
}
