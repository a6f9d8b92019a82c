use aieyes_common::BBox;
use image::{imageops, RgbImage};
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

use crate::config::{FaceConfig, FaceStrategy};
use crate::error::Result;

pub mod remote;
pub mod strategies;

pub use remote::RemoteFaceService;
pub use strategies::{DistanceMatcher, DistanceModel, EmbeddingClassifier, ProbabilityMatcher};

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBand {
    Authorized,
    /// Close to a known face but not close enough to authorize. Never alerts.
    Uncertain,
    Intruder,
    /// Crop too small or the model failed; no decision was made.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    pub name: String,
    pub is_authorized: bool,
    pub confidence: f32,
    pub band: MatchBand,
}

impl FaceMatch {
    pub fn rejected() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            is_authorized: false,
            confidence: 0.0,
            band: MatchBand::Rejected,
        }
    }

    pub fn is_intruder(&self) -> bool {
        self.band == MatchBand::Intruder
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceVerification {
    pub bbox: BBox,
    #[serde(flatten)]
    pub result: FaceMatch,
}

pub trait FaceIdentityProvider: Send + Sync {
    fn verify(&self, face_crop: &RgbImage) -> FaceMatch;
}

pub trait FaceDetector: Send + Sync {
    fn locate(&self, frame: &RgbImage) -> Result<Vec<BBox>>;
}

/// Locates faces in a frame and verifies each crop.
pub struct FaceStage {
    detector: Arc<dyn FaceDetector>,
    identity: Arc<dyn FaceIdentityProvider>,
}

impl FaceStage {
    pub fn new(detector: Arc<dyn FaceDetector>, identity: Arc<dyn FaceIdentityProvider>) -> Self {
        Self { detector, identity }
    }

    pub fn run(&self, frame: &RgbImage) -> Vec<FaceVerification> {
        let boxes = match self.detector.locate(frame) {
            Ok(boxes) => boxes,
            Err(e) => {
                warn!("Face detection failed: {}", e);
                return Vec::new();
            }
        };

        boxes
            .into_iter()
            .map(|bbox| {
                let result = match crop(frame, &bbox) {
                    Some(face) => self.identity.verify(&face),
                    None => FaceMatch::rejected(),
                };
                FaceVerification { bbox, result }
            })
            .collect()
    }
}

/// Crop clamped to the frame; `None` when nothing of the box is inside it.
pub fn crop(frame: &RgbImage, bbox: &BBox) -> Option<RgbImage> {
    if !bbox.is_valid() {
        return None;
    }
    let (w, h) = frame.dimensions();
    let x1 = bbox.x1.max(0.0).min(w as f32) as u32;
    let y1 = bbox.y1.max(0.0).min(h as f32) as u32;
    let x2 = bbox.x2.max(0.0).min(w as f32) as u32;
    let y2 = bbox.y2.max(0.0).min(h as f32) as u32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(imageops::crop_imm(frame, x1, y1, x2 - x1, y2 - y1).to_image())
}

pub fn build_face_stage(config: &FaceConfig, handle: Handle) -> Result<Option<FaceStage>> {
    if !config.enabled {
        return Ok(None);
    }

    let service = Arc::new(RemoteFaceService::new(config, handle)?);
    let identity: Arc<dyn FaceIdentityProvider> = match config.strategy {
        FaceStrategy::Distance => Arc::new(DistanceMatcher::new(
            service.clone(),
            config.min_face_size,
            config.accept_distance,
            config.uncertain_distance,
        )),
        FaceStrategy::Probability => Arc::new(ProbabilityMatcher::new(
            service.clone(),
            config.min_face_size,
            config.probability_threshold,
        )),
    };

    Ok(Some(FaceStage::new(service, identity)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoFaces;

    impl FaceDetector for TwoFaces {
        fn locate(&self, _frame: &RgbImage) -> Result<Vec<BBox>> {
            Ok(vec![
                BBox::new(0.0, 0.0, 60.0, 60.0),
                BBox::new(200.0, 200.0, 260.0, 260.0),
            ])
        }
    }

    struct AlwaysIntruder;

    impl FaceIdentityProvider for AlwaysIntruder {
        fn verify(&self, _face_crop: &RgbImage) -> FaceMatch {
            FaceMatch {
                name: UNKNOWN.to_string(),
                is_authorized: false,
                confidence: 10.0,
                band: MatchBand::Intruder,
            }
        }
    }

    #[test]
    fn faces_outside_frame_are_rejected() {
        let stage = FaceStage::new(Arc::new(TwoFaces), Arc::new(AlwaysIntruder));
        let frame = RgbImage::new(100, 100);
        let results = stage.run(&frame);
        assert_eq!(results.len(), 2);
        assert!(results[0].result.is_intruder());
        assert_eq!(results[1].result.band, MatchBand::Rejected);
    }

    #[test]
    fn crop_clamps_to_frame() {
        let frame = RgbImage::new(100, 80);
        let face = crop(&frame, &BBox::new(-10.0, 50.0, 40.0, 200.0)).unwrap();
        assert_eq!(face.dimensions(), (40, 30));
        assert!(crop(&frame, &BBox::new(10.0, 10.0, 10.0, 20.0)).is_none());
    }
}
